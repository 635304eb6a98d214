use clap::Parser;
use smart_queue_client::config::Command;
use smart_queue_client::core::geo;
use smart_queue_client::core::hub_connection::DEFAULT_RECONNECT_DELAYS;
use smart_queue_client::domain::ports::SessionStore;
use smart_queue_client::utils::{logger, validation::Validate};
use smart_queue_client::{
    ApiClient, CliConfig, ClientConfig, Coordinates, FileSessionStore, HubConnection,
    LongPollingTransport, OrderUpdatesService, Result, SqmError,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = run(&cli).await {
        tracing::error!("Command failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        if e.is_retryable() {
            eprintln!("💡 This may be temporary; try again in a moment.");
        }
        let exit_code = match e {
            SqmError::Config { .. }
            | SqmError::InvalidConfigValue { .. }
            | SqmError::MissingConfig { .. } => 2,
            SqmError::NotAuthenticated | SqmError::Unauthorized => 3,
            _ => 1,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(cli: &CliConfig) -> Result<()> {
    match &cli.command {
        Command::Distance {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
        } => {
            let from = Coordinates::new(*from_lat, *from_lon)?;
            let to = Coordinates::new(*to_lat, *to_lon)?;
            let km = geo::calculate_distance(&from, &to);
            println!(
                "{} (~{} min walk)",
                geo::format_distance(km),
                geo::calculate_eta(km)
            );
            Ok(())
        }
        Command::Eta { distance_km } => {
            if !distance_km.is_finite() || *distance_km < 0.0 {
                return Err(SqmError::validation("Distance must be a non-negative number"));
            }
            println!("{} min", geo::calculate_eta(*distance_km));
            Ok(())
        }
        Command::Nearby {
            lat,
            lon,
            radius_km,
        } => {
            let config = load_config(cli)?;
            let origin = Coordinates::new(*lat, *lon)?;
            let session = session_store(&config).load().await?;
            let client = ApiClient::from_config(&config, session)?;

            let vendors = client.nearby_vendors(origin, *radius_km).await?;
            if vendors.is_empty() {
                println!("No vendors within {}", geo::format_distance(*radius_km));
            }
            for ranked in vendors {
                println!(
                    "{:<30} {:>8}  ~{} min  {}",
                    ranked.item.name,
                    ranked.formatted_distance(),
                    ranked.eta_minutes,
                    if ranked.item.is_open { "open" } else { "closed" }
                );
            }
            Ok(())
        }
        Command::Watch { orders, vendor } => {
            let config = load_config(cli)?;
            let session = session_store(&config).load().await?;
            watch(&config, session, orders, vendor.as_deref()).await
        }
        Command::Login { email, password } => {
            let config = load_config(cli)?;
            let client = ApiClient::from_config(&config, None)?;
            let session = client.login(email, password).await?;
            session_store(&config).save(&session).await?;
            println!("✅ Logged in as {}", session.user.full_name);
            Ok(())
        }
        Command::Logout => {
            let config = load_config(cli)?;
            session_store(&config).clear().await?;
            println!("Logged out");
            Ok(())
        }
    }
}

fn load_config(cli: &CliConfig) -> Result<ClientConfig> {
    let config = cli.load_client_config()?;
    config.validate()?;
    Ok(config)
}

fn session_store(config: &ClientConfig) -> FileSessionStore {
    FileSessionStore::new(config.session_path())
}

async fn watch(
    config: &ClientConfig,
    session: Option<smart_queue_client::Session>,
    orders: &[String],
    vendor: Option<&str>,
) -> Result<()> {
    if orders.is_empty() && vendor.is_none() {
        return Err(SqmError::validation("Pass at least one --order or a --vendor to watch"));
    }

    let transport = LongPollingTransport::for_orders_hub(config, session)?;
    let delays = config
        .reconnect_delays()
        .unwrap_or_else(|| DEFAULT_RECONNECT_DELAYS.to_vec());
    let connection = HubConnection::with_reconnect_delays(Arc::new(transport), delays);
    connection.on_reconnecting(|| tracing::warn!("Live updates interrupted, reconnecting"));
    connection.on_reconnected(|| tracing::info!("Live updates restored"));
    connection.on_close(|reason| {
        tracing::warn!("Live updates stopped: {}", reason.unwrap_or("closed"))
    });

    let service = OrderUpdatesService::new(connection);
    let updates = service.updates();
    updates.on_status_changed(|event| {
        tracing::info!(order = %event.order_id, status = %event.status, "Order status changed");
        match event.queue_position {
            Some(position) => println!("{}: {} (position {})", event.order_id, event.status, position),
            None => println!("{}: {}", event.order_id, event.status),
        }
    });
    updates.on_created(|event| {
        tracing::info!(order = %event.order.id, "Order created");
        println!("{}: new order ({} items)", event.order.id, event.order.items.len());
    });
    updates.on_eta_updated(|event| {
        tracing::info!(order = %event.order_id, minutes = event.estimated_minutes, "ETA updated");
        println!("{}: ready in ~{} min", event.order_id, event.estimated_minutes);
    });
    updates.on_delayed(|event| {
        tracing::warn!(order = %event.order_id, minutes = event.delay_minutes, "Order delayed");
        println!(
            "{}: delayed by {} min{}",
            event.order_id,
            event.delay_minutes,
            event
                .reason
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );
    });

    service.start().await?;
    for order_id in orders {
        service.join_order_group(order_id).await?;
    }
    if let Some(vendor_id) = vendor {
        service.join_vendor_group(vendor_id).await?;
    }
    println!("Watching for order updates. Press Ctrl+C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl+C: {}", e);
    }
    service.stop().await;
    Ok(())
}
