mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use health_dss::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
