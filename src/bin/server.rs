use std::sync::Arc;

use respd::config::Config;
use respd::{server, CommandTable, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    server::run(config, Arc::new(CommandTable::default())).await
}
