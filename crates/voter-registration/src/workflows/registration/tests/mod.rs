mod common;
mod lifecycle;
mod pdf;
