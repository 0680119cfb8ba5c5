use std::collections::BTreeMap;

use color_eyre::eyre::{Result, WrapErr};
use testcontainers::{
    ContainerAsync, ContainerRequest, GenericImage, ImageExt, core::IntoContainerPort,
    runners::AsyncRunner,
};
use tracing::info;

const IMAGE_NAME: &str = "cubejs/cube";
const IMAGE_TAG_VAR: &str = "BIRDBOX_CUBEJS_VERSION";
const DEFAULT_IMAGE_TAG: &str = "latest";

/// Port the server's API listens on inside the container.
pub(crate) const API_PORT: u16 = 4000;

pub(crate) fn image_tag(override_tag: Option<String>) -> String {
    override_tag.unwrap_or_else(|| DEFAULT_IMAGE_TAG.to_string())
}

/// Start the released server image with the env-file variables and return
/// the container plus the host port mapped to its API.
pub(crate) async fn start_container(
    env: &BTreeMap<String, String>,
) -> Result<(ContainerAsync<GenericImage>, u16)> {
    let tag = image_tag(std::env::var(IMAGE_TAG_VAR).ok());
    info!(image = IMAGE_NAME, %tag, "starting server container");

    let mut request: ContainerRequest<GenericImage> =
        GenericImage::new(IMAGE_NAME, &tag).with_exposed_port(API_PORT.tcp()).into();
    for (key, value) in env {
        request = request.with_env_var(key, value);
    }

    let container = request
        .start()
        .await
        .wrap_err("starting server container")?;
    let port = container
        .get_host_port_ipv4(API_PORT)
        .await
        .wrap_err("resolving mapped api port")?;

    info!(port, "server container listening");
    Ok((container, port))
}
