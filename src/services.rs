use std::collections::HashMap;
use std::fs;
use std::sync::OnceLock;

/// Marker returned when no description is known for a port.
pub const UNKNOWN_SERVICE: &str = "unknown";

const SYSTEM_SERVICES_PATH: &str = "/etc/services";

const WELL_KNOWN: &[(u16, &str)] = &[
    (21, "FTP (File Transfer Protocol)"),
    (22, "SSH (Secure Shell)"),
    (23, "Telnet (remote login)"),
    (25, "SMTP (Simple Mail Transfer Protocol)"),
    (53, "DNS (Domain Name System)"),
    (80, "HTTP (Hypertext Transfer Protocol)"),
    (110, "POP3 (Post Office Protocol v3)"),
    (143, "IMAP (Internet Message Access Protocol)"),
    (443, "HTTPS (HTTP over TLS)"),
    (3306, "MySQL database"),
    (3389, "RDP (Remote Desktop Protocol)"),
    (8080, "HTTP-Alt (alternate HTTP port)"),
];

/// Maps a port number to a human-readable service description.
///
/// Lookup order: the built-in table of well-known ports, then (optionally) the
/// system services database, then [`UNKNOWN_SERVICE`]. Never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceNameResolver {
    use_system_db: bool,
}

impl ServiceNameResolver {
    /// Built-in table plus the system services database.
    pub fn system() -> Self {
        Self {
            use_system_db: true,
        }
    }

    /// Built-in table only; results do not depend on the host machine.
    pub fn builtin() -> Self {
        Self {
            use_system_db: false,
        }
    }

    pub fn resolve(&self, port: u16) -> String {
        if let Some(desc) = well_known_description(port) {
            return desc.to_string();
        }
        if self.use_system_db {
            if let Some(name) = system_services().get(&port) {
                return name.clone();
            }
        }
        UNKNOWN_SERVICE.to_string()
    }
}

impl Default for ServiceNameResolver {
    fn default() -> Self {
        Self::system()
    }
}

pub fn well_known_description(port: u16) -> Option<&'static str> {
    WELL_KNOWN
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, desc)| *desc)
}

/// Parse `services(5)` content into a port → service name map.
///
/// The first entry seen for a port wins, whatever its protocol. Malformed lines
/// are skipped.
pub fn parse_services_str(s: &str) -> HashMap<u16, String> {
    let mut out = HashMap::new();
    for raw_line in s.lines() {
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((port, _proto)) = port_proto.split_once('/') else {
            continue;
        };
        if let Ok(port) = port.parse::<u16>() {
            out.entry(port).or_insert_with(|| name.to_string());
        }
    }
    out
}

fn system_services() -> &'static HashMap<u16, String> {
    static DB: OnceLock<HashMap<u16, String>> = OnceLock::new();
    DB.get_or_init(|| match fs::read_to_string(SYSTEM_SERVICES_PATH) {
        Ok(content) => parse_services_str(&content),
        Err(e) => {
            tracing::debug!("system services database unavailable: {e}");
            HashMap::new()
        }
    })
}
