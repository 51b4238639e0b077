use std::net::IpAddr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub _type: String,
    pub value: String,
}

impl Identifier {
    pub fn dns(value: &str) -> Self {
        Self {
            _type: "dns".to_owned(),
            value: value.to_owned(),
        }
    }

    /// IP address identifier, see [RFC 8738].
    ///
    /// [RFC 8738]: https://datatracker.ietf.org/doc/html/rfc8738
    pub fn ip(addr: IpAddr) -> Self {
        Self {
            _type: "ip".to_owned(),
            value: addr.to_string(),
        }
    }

    /// Picks `ip` for values that parse as an IP address and `dns` otherwise.
    pub fn from_name(value: &str) -> Self {
        match value.parse::<IpAddr>() {
            Ok(addr) => Self::ip(addr),
            Err(_) => Self::dns(value),
        }
    }

    pub fn is_type_dns(&self) -> bool {
        self._type == "dns"
    }
}
