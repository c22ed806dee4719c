use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use actix_web_prom::PrometheusMetricsBuilder;
use kube::client::Client;
use log::{debug, info, warn};
use mix_scheduler_admission_webhook::{
    cluster, errors::Error, metrics, tls, views, AdmissionEngine, Config, EnvironmentConfig,
};
use prometheus::Registry;
use tokio::sync::watch;

#[actix_rt::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let env_config = envy::from_env::<EnvironmentConfig>()?;
    debug!("Environment config: {:?}", &env_config);
    let config = Arc::new(Config::from_env_config(env_config)?);
    info!("Starting with config: {:?}", config);

    let client = Client::try_default().await.map_err(Error::KubeError)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (cache, sync) = cluster::start(client, shutdown_rx);
    let gate = cache.gate();

    let state = web::Data::new(views::AppState {
        engine: AdmissionEngine::new(config.clone(), Arc::new(cache)),
        gate,
    });

    let registry = Registry::new();
    metrics::custom_metrics(&registry)?;
    let prometheus = PrometheusMetricsBuilder::new(metrics::METRICS_NAMESPACE)
        .registry(registry)
        .endpoint("/metrics")
        .build()
        .map_err(|err| Error::Config(format!("prometheus middleware: {}", err)))?;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(prometheus.clone())
            .wrap(middleware::Logger::default().exclude("/health").exclude("/metrics"))
            .configure(views::routes)
    });

    let bind_address = config.bind_address();
    let server = match tls::load_server_config(&config.tls_dir)? {
        Some(tls_config) => {
            info!("Listening on https://{}", bind_address);
            server.bind_rustls_021(&bind_address, tls_config)?
        }
        None => {
            warn!(
                "No certificate in {}, listening on plain http://{}",
                config.tls_dir.display(),
                bind_address
            );
            server.bind(&bind_address)?
        }
    };
    let run = server.run();

    let mut synced = Box::pin(sync.wait_until_synced());
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        complete = &mut synced => {
            if !complete {
                warn!("Cache sync did not complete, reads stay on direct queries");
            }
            run.await
        }
    };
    info!("actix exited");

    let _ = shutdown_tx.send(true);
    result.map_err(Error::from)
}
