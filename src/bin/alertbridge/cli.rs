use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Relay Alertmanager webhooks to a Feishu group with Grafana panel snapshots",
    long_about = None
)]
pub struct Cli {
    /// Chemin du fichier de configuration TOML.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Filtre de logs explicite (ex. "alertbridge=debug").
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Utilise un layer JSON pour les logs (`--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Désactive la vérification TLS des requêtes sortantes.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "verify_tls")]
    pub insecure: bool,

    /// Active la vérification TLS des requêtes sortantes.
    #[arg(long, action = ArgAction::SetTrue)]
    pub verify_tls: bool,

    /// Affiche la première règle d'alerte Prometheus puis quitte.
    #[arg(long, action = ArgAction::SetTrue)]
    pub list_rules: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// `Some` si un flag surcharge `http.verify_tls`.
    pub const fn verify_tls_override(&self) -> Option<bool> {
        if self.insecure {
            Some(false)
        } else if self.verify_tls {
            Some(true)
        } else {
            None
        }
    }
}
