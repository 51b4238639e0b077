use std::net::IpAddr;

use der::asn1::{Ia5String, OctetString};
use x509_cert::{
    builder::{Builder, RequestBuilder as CsrBuilder},
    ext::pkix::{name::GeneralName, SubjectAltName},
    name::Name,
    request::CertReq,
};

use crate::error::*;

/// Make a P-256 private key (from which we can derive a public key).
pub fn create_p256_key() -> p256::ecdsa::SigningKey {
    let csprng = &mut rand::thread_rng();
    ecdsa::SigningKey::from(p256::SecretKey::random(csprng))
}

/// Creates a CSR with `names` and signs it with `signer`.
///
/// The first item of `names` is picked for the CSR's Common Name (CN). All names are added to a
/// Subject Alternative Name (SAN) extension, IP addresses as `iPAddress` entries.
pub fn create_csr(signer: &p256::ecdsa::SigningKey, names: &[&str]) -> Result<CertReq> {
    let primary_name = names
        .first()
        .ok_or_else(|| Error::InvalidArgument("a CSR needs at least one name".to_owned()))?;

    let subject = format!("CN={primary_name}")
        .parse::<Name>()
        .map_err(|err| Error::InvalidArgument(format!("invalid common name: {err}")))?;

    let san = names
        .iter()
        .map(|&name| general_name(name))
        .collect::<Result<Vec<_>>>()?;

    let mut csr = CsrBuilder::new(subject, signer).map_err(csr_error)?;
    csr.add_extension(&SubjectAltName(san)).map_err(csr_error)?;

    csr.build::<p256::ecdsa::DerSignature>().map_err(csr_error)
}

fn general_name(name: &str) -> Result<GeneralName> {
    let invalid = |err: der::Error| Error::InvalidArgument(format!("invalid name {name}: {err}"));

    Ok(match name.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => GeneralName::IpAddress(OctetString::new(ip.octets()).map_err(invalid)?),
        Ok(IpAddr::V6(ip)) => GeneralName::IpAddress(OctetString::new(ip.octets()).map_err(invalid)?),
        Err(_) => GeneralName::DnsName(Ia5String::new(name).map_err(invalid)?),
    })
}

fn csr_error(err: x509_cert::builder::Error) -> Error {
    Error::Signing(format!("build csr: {err}"))
}
