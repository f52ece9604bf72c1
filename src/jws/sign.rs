use base64::engine::{general_purpose::STANDARD as BASE64, Engine};

use super::{
    algorithm::{DigestAlgorithm, SignatureAlgorithm},
    compact,
    header::Header,
};
use crate::{
    error::{Error, Result},
    gateway::{self, Mechanism, SignOption, SigningGateway},
};

/// Signs `payload` under pre-serialized `header` bytes and returns the compact token.
///
/// The gateway project holding the private key is `project`. The mechanism is
/// taken from the project's certificate and the digest from `hash`, falling
/// back to the algorithm's own digest. No key material is read locally. The
/// signing input travels to the gateway as standard base64 with `b64_flag` set.
pub async fn sign_literal(
    payload: &[u8],
    alg: SignatureAlgorithm,
    project: &str,
    header: &[u8],
    hash: Option<&str>,
    gateway: &dyn SigningGateway,
) -> Result<String> {
    let digest_algorithm = DigestAlgorithm::select(hash, alg)?;
    let signing_input = compact::build_signing_input(header, payload);

    let key = gateway::fetch_key_material(gateway, project).await?;
    let mechanism = Mechanism::select(alg, &key.public_key)?;
    log::debug!("signing with {mechanism}/{digest_algorithm} in project {project}");

    let signature = gateway
        .sign(
            project,
            &SignOption {
                key_id: key.key_id,
                mechanism,
                digest_algorithm,
                payload: BASE64.encode(&signing_input).into_bytes(),
                b64_flag: true,
                raw_flag: false,
            },
        )
        .await
        .map_err(|source| Error::SigningFailed {
            project: project.to_owned(),
            source: source.context("unable to sign"),
        })?;

    Ok(compact::assemble(header, payload, &signature))
}

/// Signs `payload` with a header that carries only `alg`.
pub async fn sign_with_default_header(
    payload: &[u8],
    alg: SignatureAlgorithm,
    project: &str,
    gateway: &dyn SigningGateway,
) -> Result<String> {
    let header = Header::with_algorithm(alg).serialize()?;
    sign_literal(payload, alg, project, &header, None, gateway).await
}
