use std::fmt;

use crate::{
    api,
    dir::Operation,
    error::*,
    key::AccountKey,
    trans::Signer,
    AcmeContext,
};

/// Enumeration of reasons for revocation.
///
/// The reason codes are taken from [RFC 5280 §5.3.1].
///
/// [RFC 5280 §5.3.1]: https://tools.ietf.org/html/rfc5280#section-5.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CACompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    // value 7 is not used
    RemoveFromCRL = 8,
    PrivilegeWithdrawn = 9,
    AACompromise = 10,
}

impl RevocationReason {
    /// Value of the `reason` field, if any.
    ///
    /// > the reason code CRL entry extension SHOULD be absent instead of
    /// > using the unspecified (0) reasonCode value
    ///
    /// see <https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1>
    fn code(self) -> Option<u32> {
        match self {
            RevocationReason::Unspecified => None,
            reason => Some(reason as u32),
        }
    }
}

impl TryFrom<u32> for RevocationReason {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        use RevocationReason::*;

        Ok(match code {
            0 => Unspecified,
            1 => KeyCompromise,
            2 => CACompromise,
            3 => AffiliationChanged,
            4 => Superseded,
            5 => CessationOfOperation,
            6 => CertificateHold,
            8 => RemoveFromCRL,
            9 => PrivilegeWithdrawn,
            10 => AACompromise,
            code => return Err(Error::InvalidReason(code)),
        })
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl AcmeContext {
    /// Revoke a DER encoded certificate for the reason given.
    ///
    /// With `cert_key`, the certificate's own key, the request is signed by that key and embeds
    /// its public JWK; no account is needed. Otherwise the account key signs and the account is
    /// referenced by `kid`, which requires a known account.
    pub async fn revoke_certificate(
        &self,
        certificate_der: &[u8],
        reason: RevocationReason,
        cert_key: Option<&AccountKey>,
    ) -> Result<()> {
        let inner = &self.inner;

        let revocation = api::Revocation::from_der(certificate_der, reason.code());
        let payload = serde_json::to_vec(&revocation)?;

        let signer = match cert_key {
            Some(key) => Signer::Key(key),
            None => Signer::Account { generation: None },
        };

        let url = inner
            .directory
            .endpoint(&*inner.http, Operation::RevokeCert)
            .await?;

        log::debug!("Revoke certificate, reason: {reason}");
        inner.call(&url, &payload, signer).await?;

        Ok(())
    }

    /// Like [`revoke_certificate`](Self::revoke_certificate) with a raw RFC 5280 reason code.
    ///
    /// Codes outside the enumeration fail with [`Error::InvalidReason`] before anything is sent.
    pub async fn revoke_certificate_code(
        &self,
        certificate_der: &[u8],
        reason_code: u32,
        cert_key: Option<&AccountKey>,
    ) -> Result<()> {
        let reason = RevocationReason::try_from(reason_code)?;
        self.revoke_certificate(certificate_der, reason, cert_key)
            .await
    }
}
