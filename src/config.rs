use camino::Utf8Path;
use config::{Config, ConfigError};

pub use hasslink_api::config::*;

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default("server.address", "0.0.0.0")?
        .set_default("server.port", 8124)?
        .set_default("hasslink.links_file", "links.yaml")?
        .add_source(config::File::with_name(filename.as_str()))
        .build()?;

    settings.try_deserialize()
}
