use ccg::bridge::Bridge;
use ccg::config::Settings;
use ccg::dictionary::{Dictionary, DEFAULT_DICT_XML};
use ccg::rest;
use std::future::IntoFuture;
use std::fs;
use std::process;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let settings = match Settings::load(&config_path) {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            log::error!("Cannot load settings: {}", e);
            process::exit(1);
        }
    };

    let mut dict = Dictionary::new();
    if let Err(e) = dict.load_xml(&DEFAULT_DICT_XML) {
        log::error!("Cannot load built-in dictionary: {}", e);
        process::exit(1);
    }
    if !settings.extra_diameter_xml.is_empty() {
        let xml = match fs::read_to_string(&settings.extra_diameter_xml) {
            Ok(xml) => xml,
            Err(e) => {
                log::error!(
                    "Cannot read extra dictionary {}: {}",
                    settings.extra_diameter_xml,
                    e
                );
                process::exit(1);
            }
        };
        if let Err(e) = dict.load_xml(&xml) {
            log::error!(
                "Cannot load extra dictionary {}: {}",
                settings.extra_diameter_xml,
                e
            );
            process::exit(1);
        }
    }
    let dict = Arc::new(dict);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (bridge, gateway) =
        match Bridge::connect(Arc::clone(&settings), Arc::clone(&dict), shutdown_rx).await {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("Client connect to server failed({}).", e);
                process::exit(1);
            }
        };
    let mut bridge_task = tokio::spawn(bridge.run());

    let app = rest::router(gateway);
    let listener = match tokio::net::TcpListener::bind(&settings.local_rest_server_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Cannot bind {}: {}", settings.local_rest_server_addr, e);
            process::exit(1);
        }
    };
    log::info!("REST Server Serve at {}", settings.local_rest_server_addr);

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                log::error!("REST server failed: {}", e);
            }
            process::exit(1);
        }
        result = &mut bridge_task => {
            match result {
                Ok(Err(e)) => log::error!("{}", e),
                Err(e) => log::error!("Bridge task failed: {}", e),
                Ok(Ok(())) => {}
            }
            process::exit(1);
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            let _ = tokio::time::timeout(Duration::from_secs(5), bridge_task).await;
            log::info!("Client cleanup and exit.");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("Cannot install SIGTERM handler: {}", e);
            let _ = ctrl_c.await;
        }
    }
}
