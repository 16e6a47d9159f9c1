mod cli;
mod infra;
mod routes;
mod server;

use voter_registration::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
