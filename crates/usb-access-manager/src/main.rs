mod app;
mod catalog;
mod config;
mod host;
mod signals;
mod udev;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
  color_eyre::install()?;
  app::run().await
}
