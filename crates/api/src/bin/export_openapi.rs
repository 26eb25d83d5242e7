// Export OpenAPI specification as JSON
//
// Usage: cargo run --bin export-openapi > openapi.json
//
// Generates the document without opening the store or binding a port.

use agenda_api::openapi::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    println!("{}", ApiDoc::openapi().to_pretty_json()?);
    Ok(())
}
