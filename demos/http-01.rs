use std::{collections::HashMap, sync::Arc, time::Duration};

use acme::{create_p256_key, AccountKey, AcmeContext, DirectoryUrl};
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use parking_lot::RwLock;

const PRIMARY_NAME: &str = "example.org";

type Proofs = Arc<RwLock<HashMap<String, String>>>;

#[get("/.well-known/acme-challenge/{token}")]
async fn challenge(proofs: web::Data<Proofs>, token: web::Path<String>) -> impl Responder {
    match proofs.read().get(token.as_str()) {
        Some(proof) => HttpResponse::Ok().body(proof.clone()),
        None => HttpResponse::NotFound().finish(),
    }
}

#[actix_web::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let proofs = Proofs::default();

    // Create temporary Actix Web server for ACME challenge.
    let srv = HttpServer::new({
        let proofs = Arc::clone(&proofs);
        move || {
            App::new()
                .app_data(web::Data::new(Arc::clone(&proofs)))
                .service(challenge)
        }
    })
    .bind(("0.0.0.0", 80))?
    .shutdown_timeout(0)
    .run();

    let srv_handle = srv.handle();
    let srv_task = actix_web::rt::spawn(srv);

    // Use `DirectoryUrl::LetsEncrypt` for production uses.
    let url = DirectoryUrl::LetsEncryptStaging;

    // You should persist the key (`AccountKey::to_pkcs8_pem`) and reuse it afterwards.
    let ctx = AcmeContext::new(url, AccountKey::generate_p256())?;

    // Your contact addresses, note the `mailto:`
    ctx.get_or_create(&["mailto:foo@bar.com"], true).await?;

    // Order a new TLS certificate for a domain.
    let mut order = ctx.new_order(&[PRIMARY_NAME], None, None).await?;

    // If the ownership of the domain(s) have already been
    // authorized in a previous order, the order may already
    // be ready. The ACME API provider decides.
    for auth in order.authorizations().await? {
        if !auth.need_challenge() {
            continue;
        }

        let mut http_challenge = auth
            .http_challenge()
            .ok_or_else(|| eyre::eyre!("no http-01 challenge for {}", auth.identifier().value))?;

        // The token is the last path segment, the key authorization is the body.
        proofs.write().insert(
            http_challenge.token().to_owned(),
            http_challenge.key_authorization()?,
        );

        // After the proof is accessible from the web, tell the
        // ACME API to start checking it.
        http_challenge.validate().await?;
    }

    // Poll until all authorizations are valid.
    order
        .wait_until_ready(Duration::from_secs(5), Duration::from_secs(300))
        .await?;

    // Ownership is proven. Create a private key for the
    // certificate; you can provide your own key instead.
    let signing_key = create_p256_key();

    // Submit the CSR. This causes the ACME provider to enter a
    // state of "processing" that must be polled until the
    // certificate is either issued or rejected.
    order.finalize_with_key(&signing_key).await?;
    order
        .wait_for_certificate(Duration::from_secs(5), Duration::from_secs(300))
        .await?;

    // Finally download the certificate.
    let cert = order.download_certificate().await?;
    println!("{}", String::from_utf8_lossy(&cert));

    // Stop temporary server for ACME challenge
    srv_handle.stop(true).await;
    srv_task.await??;

    Ok(())
}
