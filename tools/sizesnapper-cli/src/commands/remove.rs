//! Delete a layer.

use sizesnapper_common::config::AppConfig;

use super::{open_session, resolve_image, Store};

pub async fn run(store: &Store, config: &AppConfig, needle: &str, image: &str) -> anyhow::Result<()> {
    let mut session = open_session(store, config, needle).await?;
    let layer = resolve_image(session.layers(), image)?;
    let (id, file_name) = (layer.id.clone(), layer.file_name.clone());

    session.remove_image(&id).await?;
    println!("Removed {} from '{}'", file_name, session.project().name);

    session.close();
    Ok(())
}
