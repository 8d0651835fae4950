use mongodb::{options::ClientOptions, Client, Database};

use crate::error::Result;

pub async fn connect(database_url: &str, database_name: &str) -> Result<Database> {
    // Parse the connection string into client options
    let mut client_options = ClientOptions::parse(database_url).await?;
    client_options.app_name = Some("sweet-shop".to_string());

    let client = Client::with_options(client_options)?;
    log::info!("connected to MongoDB database {}", database_name);
    Ok(client.database(database_name))
}
