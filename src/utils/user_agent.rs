/*!
The product-token identity carried in `SERVER` headers, in the form
`OS/version UPnP/1.0 product/version`.
*/

use crate::UPNP_VERSION;

const PRODUCT_NAME: &str = env!("CARGO_PKG_NAME");

const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

lazy_static! {
    static ref SERVER_IDENT: String = format!(
        "{}/{} UPnP/{} {}/{}",
        os::system_name(),
        os::system_version(),
        UPNP_VERSION,
        PRODUCT_NAME,
        PRODUCT_VERSION
    );
}

pub fn ident() -> String {
    SERVER_IDENT.clone()
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

#[cfg(target_os = "macos")]
mod os {
    use std::process::Command;

    pub fn system_name() -> String {
        command_output("sw_vers", "-productName").unwrap_or_else(|| "macOS".to_string())
    }

    pub fn system_version() -> String {
        command_output("sw_vers", "-productVersion").unwrap_or_else(|| "unknown".to_string())
    }

    fn command_output(command: &str, argument: &str) -> Option<String> {
        let output = Command::new(command).arg(argument).output().ok()?;
        let output = String::from_utf8(output.stdout).ok()?;
        let output = output.trim();
        if output.is_empty() {
            None
        } else {
            Some(output.to_string())
        }
    }
}

#[cfg(all(not(target_os = "macos"), target_family = "unix"))]
mod os {
    use std::process::Command;

    pub fn system_name() -> String {
        command_output("uname", "-s").unwrap_or_else(|| "Unix".to_string())
    }

    pub fn system_version() -> String {
        command_output("uname", "-r").unwrap_or_else(|| "unknown".to_string())
    }

    fn command_output(command: &str, argument: &str) -> Option<String> {
        let output = Command::new(command).arg(argument).output().ok()?;
        let output = String::from_utf8(output.stdout).ok()?;
        let output = output.trim();
        if output.is_empty() {
            None
        } else {
            Some(output.to_string())
        }
    }
}

#[cfg(target_family = "windows")]
mod os {
    pub fn system_name() -> String {
        "Windows".to_string()
    }

    pub fn system_version() -> String {
        "unknown".to_string()
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_has_three_product_tokens() {
        let ident = ident();
        let tokens: Vec<&str> = ident.split(' ').collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], "UPnP/1.0");
        assert!(tokens[2].starts_with("upnp-agent/"));
    }
}
