//! # Record Subcommands
//!
//! `seal` assembles a record for one file with the host device facts and
//! an Ed25519 signature, persists it, and prints its canonical text.
//! `verify` parses such text into a scratch in-memory store and checks
//! every signature. `list` prints the records in the local repository.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use capture_collector::{Collector, CollectorConfig, DeviceFactsProvider, TablePreferences};
use capture_crypto::{Ed25519KeyPair, Ed25519SignatureProvider, Ed25519Verifier, VerifierRegistry, ED25519_PROVIDER_ID};
use capture_proof::{PayloadMeta, Payloads, Proof, ProofRepository, TableProofRepository};
use capture_store::{ImageStore, StoreContext};

use crate::host::{HostDeviceInfo, NoGeolocation};
use crate::{read_file, Workspace};

fn signing_key(ws: &Workspace) -> Ed25519KeyPair {
    match ws.config.signing_seed {
        Some(seed) => Ed25519KeyPair::from_seed(&seed),
        None => {
            tracing::warn!("CAPTURE_SIGNING_KEY not set, signing with an ephemeral key");
            Ed25519KeyPair::generate()
        }
    }
}

fn verifiers() -> VerifierRegistry {
    VerifierRegistry::new().with(ED25519_PROVIDER_ID, Arc::new(Ed25519Verifier))
}

pub async fn run_seal(ws: &Workspace, file: &Path, mime: &str) -> Result<u8> {
    let bytes = read_file(file).await?;
    let repository = Arc::new(TableProofRepository::new(&ws.context, ws.store.clone())?);
    let collector = Collector::new(
        ws.store.clone(),
        repository,
        CollectorConfig::from(&ws.config),
    );

    let preferences = TablePreferences::new(&ws.context, capture_collector::DEVICE_FACTS_PROVIDER_ID)?;
    collector.add_facts_provider(Arc::new(DeviceFactsProvider::new(
        Arc::new(HostDeviceInfo),
        Arc::new(NoGeolocation),
        Arc::new(preferences),
    )));
    let signer = Ed25519SignatureProvider::new(ED25519_PROVIDER_ID, signing_key(ws));
    let public_key = signer.public_key_hex();
    collector.add_signature_provider(Arc::new(signer));

    let mut payloads = Payloads::new();
    payloads.insert(BASE64_STANDARD.encode(&bytes), PayloadMeta::new(mime));
    let proof = collector.run_and_store(payloads).await.context("record assembly failed")?;

    println!("{}", proof.stringify().await?);
    eprintln!("OK: sealed id={} public_key={public_key}", proof.get_id().await?);
    Ok(0)
}

pub async fn run_verify(file: &Path) -> Result<u8> {
    let text = String::from_utf8(read_file(file).await?)
        .with_context(|| format!("record file is not UTF-8: {}", file.display()))?;
    let scratch = Arc::new(ImageStore::new(
        &StoreContext::in_memory(),
        Arc::new(capture_store::ImageThumbnailer),
        capture_core::config::DEFAULT_THUMBNAIL_MAX,
    )?);
    let proof = Proof::parse(scratch, &text).await.context("invalid record")?;
    let id = proof.get_id().await?;

    if proof.is_verified(&verifiers()).await? {
        println!("OK: verified id={id} signatures={}", proof.signatures().len());
        Ok(0)
    } else {
        println!("FAIL: signature check failed for id={id}");
        Ok(2)
    }
}

pub async fn run_list(ws: &Workspace) -> Result<u8> {
    let repository = TableProofRepository::new(&ws.context, ws.store.clone())?;
    let proofs = repository.get_all().await?;
    for proof in &proofs {
        println!(
            "{} timestamp={} payloads={} signatures={}",
            proof.get_id().await?,
            proof.timestamp().as_millis(),
            proof.indexed_payloads().len(),
            proof.signatures().len(),
        );
    }
    println!("OK: {} record(s)", proofs.len());
    Ok(0)
}
