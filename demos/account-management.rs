use std::io;

use acme::{AccountKey, AcmeContext, DirectoryUrl};
use tokio::fs;

const ACCOUNTS_DIR: &str = "./acme-accounts";

const CONTACT_EMAIL: Option<&str> = None;

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("ensuring accounts dir exists");
    fs::create_dir_all(ACCOUNTS_DIR).await?;

    let key_path = format!("{ACCOUNTS_DIR}/account.pem");

    log::info!("loading account key from disk");
    let (key, existing) = match fs::read_to_string(&key_path).await {
        Ok(pem) => (AccountKey::from_pkcs8_pem(&pem)?, true),

        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::info!("generating account key");
            let key = AccountKey::generate_p256();

            log::info!("persisting account key to {key_path}");
            fs::write(&key_path, key.to_pkcs8_pem()?.as_bytes()).await?;

            (key, false)
        }

        Err(err) => return Err(err.into()),
    };

    let ctx = AcmeContext::new(DirectoryUrl::LetsEncryptStaging, key)?;

    let mut acc = if existing {
        log::info!("looking up existing account");
        ctx.load_existing().await?
    } else {
        let contact = CONTACT_EMAIL.map(|email| format!("mailto:{email}"));
        let contacts = contact.as_deref().into_iter().collect::<Vec<_>>();

        log::info!("registering with ACME provider");
        ctx.get_or_create(&contacts, true).await?
    };

    log::info!("account URL: {}", acc.url());
    acc.refresh().await?;
    dbg!(acc.api_account());

    // roll the account over to a fresh key and persist it
    log::info!("changing account key");
    let new_key = AccountKey::generate_p384();
    let new_pem = new_key.to_pkcs8_pem()?;
    ctx.change_key(new_key).await?;
    fs::write(&key_path, new_pem.as_bytes()).await?;

    log::info!("new key thumbprint: {}", ctx.account_key().thumbprint()?);

    Ok(())
}
