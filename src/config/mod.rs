pub mod toml_config;

pub use toml_config::ClientConfig;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "sqm")]
#[command(about = "Smart queue client: nearby vendors, walking times and live order updates")]
pub struct CliConfig {
    #[arg(long, short, global = true, help = "Path to a TOML config file (defaults to SQM_* env vars)")]
    pub config: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Great-circle distance and walking time between two points
    Distance {
        #[arg(allow_negative_numbers = true)]
        from_lat: f64,
        #[arg(allow_negative_numbers = true)]
        from_lon: f64,
        #[arg(allow_negative_numbers = true)]
        to_lat: f64,
        #[arg(allow_negative_numbers = true)]
        to_lon: f64,
    },
    /// Walking time for a distance in kilometers
    Eta { distance_km: f64 },
    /// Vendors near a point, nearest first
    Nearby {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(long, default_value = "2.0")]
        radius_km: f64,
    },
    /// Follow live order updates until interrupted
    Watch {
        #[arg(long = "order", help = "Order id to follow (repeatable)")]
        orders: Vec<String>,
        #[arg(long, help = "Follow every order of a vendor")]
        vendor: Option<String>,
    },
    /// Log in and store the session
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn load_client_config(&self) -> crate::utils::error::Result<ClientConfig> {
        match &self.config {
            Some(path) => ClientConfig::from_file(path),
            None => ClientConfig::from_env(),
        }
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_distance_with_negative_coordinates() {
        let cli = CliConfig::try_parse_from([
            "sqm", "distance", "-33.8688", "151.2093", "40.7128", "-74.0060",
        ])
        .unwrap();

        match cli.command {
            Command::Distance {
                from_lat, to_lon, ..
            } => {
                assert_eq!(from_lat, -33.8688);
                assert_eq!(to_lon, -74.0060);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_watch_with_repeated_orders() {
        let cli = CliConfig::try_parse_from([
            "sqm", "--verbose", "watch", "--order", "o-1", "--order", "o-2",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Command::Watch { orders, vendor } => {
                assert_eq!(orders, vec!["o-1", "o-2"]);
                assert!(vendor.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
