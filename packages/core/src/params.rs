//! Flat parameter maps
//!
//! Front ends (the CLI, a task dispatcher) describe a run as string keys and
//! values. [`from_parameter_map`] turns such a map into a validated
//! [`OperationSpec`] and [`TargetSet`], or fails before any host is touched.
//!
//! Binary payloads (`debFile`, `file`) travel base64-encoded.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::address::{self, TargetSet};
use crate::error::InputError;
use crate::operation::{
    AccessMethod, Credentials, DEFAULT_SSH_PORT, OperationKind, OperationSpec, PackageSource,
};

pub const OPERATION: &str = "operation";
pub const IP_LIST: &str = "ipList";
pub const IP_RANGE: &str = "ipRange";
pub const ACCESS_METHOD: &str = "accessMethod";
pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";
pub const PRIVATE_KEY: &str = "privateKey";
pub const PASSPHRASE: &str = "passphrase";
pub const PORT: &str = "port";
pub const INSTALL_METHOD: &str = "installMethod";
pub const PACKAGE_NAME: &str = "packageName";
pub const PACKAGE_VERSION: &str = "packageVersion";
pub const DEB_FILE: &str = "debFile";
pub const DEB_FILE_NAME: &str = "debFileName";
pub const DOWNLOAD_URL: &str = "downloadUrl";
pub const FILE: &str = "file";
pub const FILE_NAME: &str = "filename";
pub const DEST_DIRECTORY: &str = "destDirectory";
pub const PORTS: &str = "ports";
pub const TIMING_TEMPLATE: &str = "timingTemplate";
pub const SUDO_USERNAME: &str = "sudoUsername";
pub const SUDO_PASSWORD: &str = "sudoPassword";

type Params = HashMap<String, String>;

/// Build a run from a flat parameter map
pub fn from_parameter_map(params: &Params) -> Result<(OperationSpec, TargetSet), InputError> {
    let kind: OperationKind = required(params, OPERATION)?.parse()?;
    let targets = targets(params)?;

    let spec = match kind {
        OperationKind::Install => {
            let credentials = credentials(params)?;
            let source = package_source(params)?;
            OperationSpec::install(source, credentials)
        }
        OperationKind::Distribute => {
            let credentials = credentials(params)?;
            OperationSpec::distribute(
                required(params, FILE_NAME)?,
                payload(params, FILE)?,
                required(params, DEST_DIRECTORY)?,
                credentials,
            )
        }
        OperationKind::Scan => OperationSpec::scan(
            optional(params, PORTS).map(str::to_string),
            optional(params, TIMING_TEMPLATE).map(str::to_string),
            sudo_credentials(params)?,
        ),
    }
    .with_port(port(params)?);

    spec.validate()?;
    Ok((spec, targets))
}

fn optional<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(params: &'a Params, key: &str) -> Result<&'a str, InputError> {
    optional(params, key).ok_or_else(|| InputError::MissingField(key.to_string()))
}

/// Decode a base64 payload; an empty value is a valid empty file
fn payload(params: &Params, key: &str) -> Result<Vec<u8>, InputError> {
    let encoded = params
        .get(key)
        .ok_or_else(|| InputError::MissingField(key.to_string()))?;
    BASE64
        .decode(encoded.trim())
        .map_err(|e| InputError::MissingField(format!("{key} (invalid base64: {e})")))
}

fn port(params: &Params) -> Result<u16, InputError> {
    match optional(params, PORT) {
        None => Ok(DEFAULT_SSH_PORT),
        Some(raw) => raw
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| InputError::MissingField(format!("{PORT} (invalid value '{raw}')"))),
    }
}

fn targets(params: &Params) -> Result<TargetSet, InputError> {
    let targets = match (optional(params, IP_RANGE), optional(params, IP_LIST)) {
        (Some(range), _) => TargetSet::from_range(range)?,
        (None, Some(list)) => host_list(list)?,
        (None, None) => return Err(InputError::MissingField(IP_LIST.to_string())),
    };

    if targets.is_empty() {
        return Err(InputError::MissingField(IP_LIST.to_string()));
    }
    Ok(targets)
}

/// Comma list of addresses, ranges and host names
fn host_list(list: &str) -> Result<TargetSet, InputError> {
    let mut hosts = Vec::new();
    for item in list.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        match address::expand(item) {
            Ok(addrs) => hosts.extend(addrs.iter().map(|a| a.to_string())),
            Err(_) if is_hostname(item) => hosts.push(item.to_string()),
            Err(e) => return Err(e),
        }
    }
    Ok(TargetSet::from_hosts(hosts))
}

fn is_hostname(item: &str) -> bool {
    item.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && item.chars().any(|c| c.is_ascii_alphabetic())
        && !item.starts_with(['-', '.'])
}

fn credentials(params: &Params) -> Result<Credentials, InputError> {
    let declared = optional(params, ACCESS_METHOD)
        .map(str::parse::<AccessMethod>)
        .transpose()?;

    let credentials = Credentials::from_fields(
        optional(params, USERNAME),
        optional(params, PASSWORD),
        optional(params, PRIVATE_KEY),
        optional(params, PASSPHRASE),
    )?;

    if let Some(declared) = declared
        && declared != credentials.access_method()
    {
        return Err(InputError::InvalidCredentials(format!(
            "{ACCESS_METHOD} is {declared:?} but the supplied secret is for {:?}",
            credentials.access_method()
        )));
    }
    Ok(credentials)
}

fn sudo_credentials(params: &Params) -> Result<Option<Credentials>, InputError> {
    match (
        optional(params, SUDO_USERNAME),
        optional(params, SUDO_PASSWORD),
    ) {
        (Some(user), Some(password)) => Ok(Some(Credentials::password(user, password))),
        (None, None) => Ok(None),
        _ => Err(InputError::InvalidCredentials(format!(
            "{SUDO_USERNAME} and {SUDO_PASSWORD} must be given together"
        ))),
    }
}

fn package_source(params: &Params) -> Result<PackageSource, InputError> {
    let method = required(params, INSTALL_METHOD)?;
    match method.to_ascii_uppercase().as_str() {
        "APT_GET" => Ok(PackageSource::Repository {
            package: required(params, PACKAGE_NAME)?.to_string(),
            version: optional(params, PACKAGE_VERSION).map(str::to_string),
        }),
        "PROVIDED_DEB" => Ok(PackageSource::Provided {
            file_name: required(params, DEB_FILE_NAME)?.to_string(),
            bytes: payload(params, DEB_FILE)?,
        }),
        "WGET" => Ok(PackageSource::Download {
            url: required(params, DOWNLOAD_URL)?.to_string(),
        }),
        other => Err(InputError::MissingField(format!(
            "{INSTALL_METHOD} (unknown method '{other}')"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn repository_install_from_map() {
        let (spec, targets) = from_parameter_map(&params(&[
            ("operation", "install"),
            ("ipRange", "192.168.1.10-12"),
            ("accessMethod", "USERNAME_PASSWORD"),
            ("username", "root"),
            ("password", "pw"),
            ("installMethod", "APT_GET"),
            ("packageName", "ahenk"),
            ("port", "2222"),
        ]))
        .unwrap();

        assert_eq!(targets.len(), 3);
        assert_eq!(spec.port, 2222);
        assert_eq!(
            spec.operation,
            Operation::Install {
                source: PackageSource::Repository {
                    package: "ahenk".to_string(),
                    version: None
                }
            }
        );
    }

    #[test]
    fn both_secrets_are_rejected() {
        let err = from_parameter_map(&params(&[
            ("operation", "install"),
            ("ipList", "10.0.0.1"),
            ("username", "root"),
            ("password", "pw"),
            ("privateKey", "/root/.ssh/id_rsa"),
            ("installMethod", "WGET"),
            ("downloadUrl", "http://repo/ahenk.deb"),
        ]))
        .unwrap_err();
        assert!(matches!(err, InputError::InvalidCredentials(_)));
    }

    #[test]
    fn declared_method_must_match_secret() {
        let err = from_parameter_map(&params(&[
            ("operation", "distribute"),
            ("ipList", "10.0.0.1"),
            ("accessMethod", "PRIVATE_KEY"),
            ("username", "root"),
            ("password", "pw"),
            ("file", ""),
            ("filename", "a.txt"),
            ("destDirectory", "/tmp"),
        ]))
        .unwrap_err();
        assert!(matches!(err, InputError::InvalidCredentials(_)));
    }

    #[test]
    fn empty_file_payload_is_allowed() {
        let (spec, _) = from_parameter_map(&params(&[
            ("operation", "distribute"),
            ("ipList", "10.0.0.1, files.lab"),
            ("username", "root"),
            ("privateKey", "/root/.ssh/id_ed25519"),
            ("file", ""),
            ("filename", "empty.txt"),
            ("destDirectory", "/tmp"),
        ]))
        .unwrap();
        match spec.operation {
            Operation::Distribute { bytes, .. } => assert!(bytes.is_empty()),
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn provided_deb_is_base64_decoded() {
        let (spec, _) = from_parameter_map(&params(&[
            ("operation", "install"),
            ("ipList", "10.0.0.1"),
            ("username", "root"),
            ("password", "pw"),
            ("installMethod", "PROVIDED_DEB"),
            ("debFileName", "ahenk.deb"),
            ("debFile", "AQID"),
        ]))
        .unwrap();
        assert_eq!(
            spec.operation,
            Operation::Install {
                source: PackageSource::Provided {
                    file_name: "ahenk.deb".to_string(),
                    bytes: vec![1, 2, 3]
                }
            }
        );
    }

    #[test]
    fn missing_fields_are_named() {
        let err = from_parameter_map(&params(&[("operation", "scan")])).unwrap_err();
        assert_eq!(err, InputError::MissingField("ipList".to_string()));

        let err = from_parameter_map(&params(&[
            ("operation", "install"),
            ("ipList", "10.0.0.1"),
            ("username", "root"),
            ("password", "pw"),
            ("installMethod", "APT_GET"),
        ]))
        .unwrap_err();
        assert_eq!(err, InputError::MissingField("packageName".to_string()));
    }

    #[test]
    fn scan_needs_no_login_but_pairs_sudo_fields() {
        let (spec, targets) = from_parameter_map(&params(&[
            ("operation", "scan"),
            ("ipRange", "10.0.0.0/30"),
            ("ports", "22,80"),
            ("timingTemplate", "4"),
        ]))
        .unwrap();
        assert_eq!(targets.len(), 4);
        assert!(spec.credentials.is_none());

        let err = from_parameter_map(&params(&[
            ("operation", "scan"),
            ("ipRange", "10.0.0.1"),
            ("sudoUsername", "admin"),
        ]))
        .unwrap_err();
        assert!(matches!(err, InputError::InvalidCredentials(_)));
    }

    #[test]
    fn bad_ranges_and_hosts() {
        let err = from_parameter_map(&params(&[
            ("operation", "scan"),
            ("ipRange", "10.0.0.9-3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, InputError::InvalidRangeFormat(_)));

        let err = from_parameter_map(&params(&[
            ("operation", "scan"),
            ("ipList", "10.0.0.300"),
        ]))
        .unwrap_err();
        assert!(matches!(err, InputError::InvalidRangeFormat(_)));
    }
}
