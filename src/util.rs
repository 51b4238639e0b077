use base64::prelude::*;
use serde::de;

use crate::{error::*, req::HttpResponse};

pub(crate) fn base64url<T: ?Sized + AsRef<[u8]>>(input: &T) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn read_json<T: de::DeserializeOwned>(res: &HttpResponse) -> Result<T> {
    let res_body = String::from_utf8_lossy(&res.body);
    log::debug!("{res_body}");
    Ok(serde_json::from_str(&res_body)?)
}

/// Like [`read_json`], but an empty body yields the type's default.
pub(crate) fn read_json_or_default<T: de::DeserializeOwned + Default>(
    res: &HttpResponse,
) -> Result<T> {
    if res.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    read_json(res)
}
