use coordinator::{
    config::CONFIG, coordinator_state::CoordinatorState, server, state_maintainer::StateMaintainer,
};
use tokio::net::TcpListener;
use utilities::{
    logger::{error, info, init_logger},
    result::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _gaurd = init_logger("Coordinator", &CONFIG.id, &CONFIG.log_level, &CONFIG.log_base);
    info!(path = %CONFIG.catalog_file, "Opening the metadata catalog");
    let state = match CoordinatorState::open(CONFIG.clone()).await {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "Error while opening the catalog Hence shuting down");
            return Err(e.into());
        }
    };
    let _maintainers = StateMaintainer::new(state.clone()).start();

    let listener = TcpListener::bind(&CONFIG.listen_addrs).await?;
    info!(addrs = %CONFIG.listen_addrs, "Coordinator http server starting");
    server::serve(listener, state).await?;
    Ok(())
}
