//! Relay-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass das Relay ohne Konfigurationsdatei
//! lauffaehig ist. Der Port kann zusaetzlich ueber die
//! Umgebungsvariable `SPRECHFUNK_RELAY_PORT` ueberschrieben werden.

use serde::{Deserialize, Serialize};

/// Vollstaendige Relay-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Sitzungs-Verwaltung
    pub sitzungen: SitzungsEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse (alle Interfaces im Standard)
    pub bind_adresse: String,
    /// UDP-Port
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 9000,
        }
    }
}

/// Sitzungs-Verwaltung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungsEinstellungen {
    /// Maximale Inaktivitaet einer Sitzung in Sekunden
    pub timeout_s: u64,
    /// Aufraeum-Frequenz: alle N empfangenen Pakete
    pub cleanup_paket_intervall: u32,
}

impl Default for SitzungsEinstellungen {
    fn default() -> Self {
        Self {
            timeout_s: 300,
            cleanup_paket_intervall: 1000,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl RelayConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    ///
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht
    /// existiert. `SPRECHFUNK_RELAY_PORT` ueberschreibt anschliessend
    /// den konfigurierten Port.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };

        if let Ok(port) = std::env::var("SPRECHFUNK_RELAY_PORT") {
            config.netzwerk.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("SPRECHFUNK_RELAY_PORT ungueltig: {e}"))?;
        }

        Ok(config)
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.netzwerk.port, 9000);
        assert_eq!(cfg.sitzungen.timeout_s, 300);
        assert_eq!(cfg.sitzungen.cleanup_paket_intervall, 1000);
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:9000");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            port = 9100

            [sitzungen]
            timeout_s = 60
        "#;
        let cfg: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.port, 9100);
        assert_eq!(cfg.sitzungen.timeout_s, 60);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.sitzungen.cleanup_paket_intervall, 1000);
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = RelayConfig::laden("/pfad/der/nicht/existiert.toml").unwrap();
        assert_eq!(cfg.netzwerk.port, 9000);
    }
}
