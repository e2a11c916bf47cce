use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures::future::{BoxFuture, try_join_all};

use docmirror_service::config::Config;
use docmirror_service::metric;
use docmirror_service::services::create_service;

use crate::endpoints;

#[cfg(feature = "https")]
fn read_pem_file(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("unable to read file: {}", path.display()))
}

/// Creates the docs service and runs the HTTP (and optionally HTTPS) server based on loaded config.
pub fn run(config: Config) -> Result<()> {
    // Log this metric before actually starting the server. This allows to see restarts even if
    // service creation fails.
    metric!(counter("server.starting") += 1);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("docmirror-web")
        .enable_all()
        .build()?;

    let service = create_service(&config).context("failed to create the docs service")?;
    let app = endpoints::create_app(service);

    let mut servers: Vec<BoxFuture<'static, std::io::Result<()>>> = vec![];

    if let Some(ref bind_str) = config.bind {
        let socket_http = bind_str
            .parse::<SocketAddr>()
            .context("invalid `bind` address")?;
        let server_http = axum_server::bind(socket_http)
            .serve(app.clone().into_make_service_with_connect_info::<SocketAddr>());
        servers.push(Box::pin(server_http));
        tracing::info!("Starting HTTP server on {}", socket_http);
    }

    if let Some(ref bind_str) = config.bind_https {
        #[cfg(feature = "https")]
        {
            use axum_server::tls_rustls::RustlsConfig;

            let https_conf = config
                .server_config
                .https
                .as_ref()
                .context("`bind_https` requires `server_config.https`")?;
            let socket_https = bind_str
                .parse::<SocketAddr>()
                .context("invalid `bind_https` address")?;
            let certificate = read_pem_file(&https_conf.certificate_path)?;
            let key = read_pem_file(&https_conf.key_path)?;
            let tls_config = runtime
                .block_on(RustlsConfig::from_pem(certificate, key))
                .context("invalid TLS certificate or key")?;
            let server_https = axum_server::bind_rustls(socket_https, tls_config)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>());
            servers.push(Box::pin(server_https));
            tracing::info!("Starting HTTPS server on {}", socket_https);
        }

        #[cfg(not(feature = "https"))]
        anyhow::bail!(
            "cannot serve HTTPS on {bind_str}: docmirror was built without the `https` feature"
        );
    }

    runtime.block_on(try_join_all(servers))?;
    tracing::info!("System shutdown complete");

    Ok(())
}
