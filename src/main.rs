use anyhow::Result;
use stencil::cli::{App, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();
    let mut app = App::from_args(&args).await?;

    app.run(args).await?;

    Ok(())
}
