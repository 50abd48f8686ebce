//! nmap-backed scanner

use std::process::Stdio;

use async_trait::async_trait;
use roxmltree::{Document, Node, ParsingOptions};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{PortScanner, ScanError, ScanFact};
use crate::address;
use crate::operation::Credentials;

/// Runs `nmap -oX -` and parses the XML report
#[derive(Debug, Clone)]
pub struct NmapScanner {
    nmap_path: String,
}

impl Default for NmapScanner {
    fn default() -> Self {
        Self::new("nmap")
    }
}

impl NmapScanner {
    pub fn new(nmap_path: impl Into<String>) -> Self {
        Self {
            nmap_path: nmap_path.into(),
        }
    }

    /// Arguments passed to nmap itself
    fn nmap_args(
        targets: &[String],
        ports: Option<&str>,
        privileged: bool,
        timing: Option<&str>,
    ) -> Vec<String> {
        let mut args = vec!["-oX".to_string(), "-".to_string()];
        if let Some(ports) = ports.filter(|p| !p.trim().is_empty()) {
            args.push("-p".to_string());
            args.push(ports.trim().to_string());
        }
        if let Some(timing) = timing.filter(|t| !t.trim().is_empty()) {
            args.push(format!("-T{}", timing.trim()));
        }
        // OS detection needs raw sockets
        if privileged {
            args.push("-O".to_string());
        }
        args.extend(targets.iter().cloned());
        args
    }

    fn build_command(&self, args: Vec<String>, sudo: Option<&Credentials>) -> Command {
        let mut cmd = match sudo {
            Some(creds) => {
                let mut cmd = Command::new("sudo");
                match creds.sudo_password() {
                    Some(_) => cmd.arg("-S").arg("-p").arg(""),
                    None => cmd.arg("-n"),
                };
                cmd.arg(&self.nmap_path);
                cmd
            }
            None => Command::new(&self.nmap_path),
        };
        cmd.args(args);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PortScanner for NmapScanner {
    async fn scan(
        &self,
        range_expr: &str,
        ports: Option<&str>,
        sudo: Option<&Credentials>,
        timing: Option<&str>,
    ) -> Result<Vec<ScanFact>, ScanError> {
        let targets = target_args(range_expr);
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(creds) = sudo {
            let local_user = whoami::username();
            if creds.username() != local_user {
                tracing::warn!(
                    sudo_user = %creds.username(),
                    local_user = %local_user,
                    "sudo username differs from the local user; sudo authenticates the local user"
                );
            }
        }

        let args = Self::nmap_args(&targets, ports, sudo.is_some(), timing);
        tracing::debug!(targets = %targets.join(" "), privileged = sudo.is_some(), "Running nmap");

        let password = sudo.and_then(Credentials::sudo_password);
        let mut cmd = self.build_command(args, sudo);
        cmd.stdin(if password.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::Spawn(format!("'{}' not found. Install nmap.", self.nmap_path))
            } else {
                ScanError::Spawn(e.to_string())
            }
        })?;

        if let Some(password) = password {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(format!("{password}\n").as_bytes())
                    .await
                    .map_err(|e| ScanError::Spawn(format!("sudo stdin: {e}")))?;
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ScanError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(ScanError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let facts = parse_report(&xml)?;
        tracing::debug!(reported = facts.len(), "nmap finished");
        Ok(facts)
    }
}

/// nmap target arguments for a range expression
///
/// IPv4 ranges use nmap's per-octet syntax; anything else (hostnames) is
/// passed through item by item.
fn target_args(range_expr: &str) -> Vec<String> {
    match address::expand(range_expr) {
        Ok(addrs) => address::scanner_targets(&addrs),
        Err(_) => range_expr
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Parse an `nmap -oX` report into one fact per reported host
pub fn parse_report(xml: &str) -> Result<Vec<ScanFact>, ScanError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| ScanError::Parse(e.to_string()))?;

    let root = doc.root_element();
    if !root.has_tag_name("nmaprun") {
        return Err(ScanError::Parse(format!(
            "expected <nmaprun>, found <{}>",
            root.tag_name().name()
        )));
    }

    Ok(children(root, "host").filter_map(parse_host).collect())
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.has_tag_name(name))
}

fn child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'static str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

fn parse_host(host: Node) -> Option<ScanFact> {
    let mut fact = ScanFact::default();
    let mut ipv6 = None;

    for address in children(host, "address") {
        let addr = address.attribute("addr").map(str::to_string);
        match address.attribute("addrtype") {
            Some("ipv4") => fact.host = addr.unwrap_or_default(),
            Some("ipv6") => ipv6 = addr,
            Some("mac") => {
                fact.mac_address = addr;
                fact.vendor = address.attribute("vendor").map(str::to_string);
            }
            _ => {}
        }
    }
    if fact.host.is_empty() {
        fact.host = ipv6?;
    }

    fact.reachable = child(host, "status")
        .and_then(|s| s.attribute("state"))
        .map(|state| state == "up")
        .unwrap_or(true);

    if let Some(hostnames) = child(host, "hostnames") {
        fact.hostnames = children(hostnames, "hostname")
            .filter_map(|h| h.attribute("name"))
            .map(str::to_string)
            .collect();
    }

    if let Some(ports) = child(host, "ports") {
        fact.open_ports = children(ports, "port")
            .filter(|p| {
                child(*p, "state").and_then(|s| s.attribute("state")) == Some("open")
            })
            .filter_map(|p| {
                let id = p.attribute("portid")?;
                let proto = p.attribute("protocol").unwrap_or("tcp");
                let service = child(p, "service")
                    .and_then(|s| s.attribute("name"))
                    .unwrap_or("unknown");
                Some(format!("{id}/{proto} {service}"))
            })
            .collect();
    }

    if let Some(os) = child(host, "os") {
        fact.os_guesses = children(os, "osmatch")
            .filter_map(|m| m.attribute("name"))
            .map(str::to_string)
            .collect();
    }

    fact.distance = child(host, "distance")
        .and_then(|d| d.attribute("value"))
        .and_then(|v| v.parse().ok());
    fact.uptime_secs = child(host, "uptime")
        .and_then(|u| u.attribute("seconds"))
        .and_then(|v| v.parse().ok());

    Some(fact)
}
