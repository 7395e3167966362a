//! Groth16 verification of snarkjs-format proofs on BN254
//!
//! Verification keys and proofs use the JSON layout written by snarkjs and
//! published with the iden3 circuits: projective points as decimal strings,
//! G2 coordinates as `[c0, c1]` pairs.

use std::path::Path;
use std::str::FromStr;

use alloy::primitives::U256;
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ff::{BigInt, PrimeField};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_snark::SNARK;
use light_poseidon::{Poseidon, PoseidonHasher};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::verifier::{VerifyError, GROTH16};
use crate::types::{AgentError, Result};

/// Verification key file for the authV2 circuit inside the circuits directory
pub const AUTH_V2_KEY_FILE: &str = "authV2.json";

type VerifyResult<T> = std::result::Result<T, VerifyError>;

/// `[x, y, z]`
pub type G1Json = [String; 3];
/// `[[x.c0, x.c1], [y.c0, y.c1], [z.c0, z.c1]]`
pub type G2Json = [[String; 2]; 3];

/// `verification_key.json` as exported by snarkjs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnarkjsVerifyingKey {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: G1Json,
    pub vk_beta_2: G2Json,
    pub vk_gamma_2: G2Json,
    pub vk_delta_2: G2Json,
    #[serde(rename = "IC")]
    pub ic: Vec<G1Json>,
}

/// Proof object carried in the JWZ proof segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnarkjsProof {
    pub pi_a: G1Json,
    pub pi_b: G2Json,
    pub pi_c: G1Json,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}

// =============================================================================
// Field and point decoding
// =============================================================================

fn fq(value: &str) -> VerifyResult<Fq> {
    Fq::from_str(value)
        .map_err(|_| VerifyError::Malformed(format!("{} is not a base field element", value)))
}

fn g1(point: &G1Json, name: &str) -> VerifyResult<G1Affine> {
    match point[2].as_str() {
        "0" => return Ok(G1Affine::identity()),
        "1" => {}
        z => {
            return Err(VerifyError::Malformed(format!(
                "{} must be affine, got z = {}",
                name, z
            )))
        }
    }
    let p = G1Affine::new_unchecked(fq(&point[0])?, fq(&point[1])?);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(VerifyError::Rejected(format!("{} is not a valid G1 point", name)));
    }
    Ok(p)
}

fn g2(point: &G2Json, name: &str) -> VerifyResult<G2Affine> {
    match (point[2][0].as_str(), point[2][1].as_str()) {
        ("0", "0") => return Ok(G2Affine::identity()),
        ("1", "0") => {}
        (c0, c1) => {
            return Err(VerifyError::Malformed(format!(
                "{} must be affine, got z = [{}, {}]",
                name, c0, c1
            )))
        }
    }
    let x = Fq2::new(fq(&point[0][0])?, fq(&point[0][1])?);
    let y = Fq2::new(fq(&point[1][0])?, fq(&point[1][1])?);
    let p = G2Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(VerifyError::Rejected(format!("{} is not a valid G2 point", name)));
    }
    Ok(p)
}

/// Public signal as a scalar. Values at or above the field modulus are rejected.
pub fn scalar(value: U256) -> VerifyResult<Fr> {
    Fr::from_bigint(BigInt::new(*value.as_limbs())).ok_or_else(|| {
        VerifyError::Rejected(format!("public signal {} exceeds the scalar field", value))
    })
}

pub fn scalar_to_u256(value: Fr) -> U256 {
    U256::from_limbs(value.into_bigint().0)
}

// =============================================================================
// Circuit key
// =============================================================================

/// Prepared verification key for one circuit
pub struct CircuitKey {
    pvk: PreparedVerifyingKey<Bn254>,
    n_public: usize,
}

impl std::fmt::Debug for CircuitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitKey")
            .field("n_public", &self.n_public)
            .finish_non_exhaustive()
    }
}

impl CircuitKey {
    pub fn from_snarkjs(vk: &SnarkjsVerifyingKey) -> VerifyResult<Self> {
        if vk.protocol != GROTH16 {
            return Err(VerifyError::Malformed(format!(
                "unsupported key protocol {}",
                vk.protocol
            )));
        }
        if vk.ic.len() != vk.n_public + 1 {
            return Err(VerifyError::Malformed(format!(
                "key declares {} public inputs but carries {} IC points",
                vk.n_public,
                vk.ic.len()
            )));
        }

        let key = VerifyingKey::<Bn254> {
            alpha_g1: g1(&vk.vk_alpha_1, "vk_alpha_1")?,
            beta_g2: g2(&vk.vk_beta_2, "vk_beta_2")?,
            gamma_g2: g2(&vk.vk_gamma_2, "vk_gamma_2")?,
            delta_g2: g2(&vk.vk_delta_2, "vk_delta_2")?,
            gamma_abc_g1: vk
                .ic
                .iter()
                .map(|p| g1(p, "IC"))
                .collect::<VerifyResult<Vec<_>>>()?,
        };
        let pvk = Groth16::<Bn254>::process_vk(&key)
            .map_err(|e| VerifyError::Malformed(format!("verification key: {}", e)))?;

        Ok(Self {
            pvk,
            n_public: vk.n_public,
        })
    }

    pub fn from_json(bytes: &[u8]) -> VerifyResult<Self> {
        let vk: SnarkjsVerifyingKey = serde_json::from_slice(bytes)
            .map_err(|e| VerifyError::Malformed(format!("verification key is not valid JSON: {}", e)))?;
        Self::from_snarkjs(&vk)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
            .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the authV2 key from `circuits_dir`. A missing file yields `None`.
    pub fn load_auth_v2(circuits_dir: &Path) -> Result<Option<Self>> {
        let path = circuits_dir.join(AUTH_V2_KEY_FILE);
        if !path.exists() {
            warn!(
                path = %path.display(),
                "authV2 verification key not found; identity callbacks will be rejected"
            );
            return Ok(None);
        }
        let key = Self::load(&path)?;
        info!(path = %path.display(), public_inputs = key.n_public, "authV2 verification key loaded");
        Ok(Some(key))
    }

    pub fn n_public(&self) -> usize {
        self.n_public
    }

    /// Pairing check of `proof` against `public_inputs`
    pub fn verify(&self, proof: &SnarkjsProof, public_inputs: &[U256]) -> VerifyResult<()> {
        if proof.protocol != GROTH16 {
            return Err(VerifyError::Rejected(format!(
                "unsupported proof protocol {}",
                proof.protocol
            )));
        }
        if public_inputs.len() != self.n_public {
            return Err(VerifyError::Rejected(format!(
                "circuit expects {} public signals, got {}",
                self.n_public,
                public_inputs.len()
            )));
        }

        let proof = Proof::<Bn254> {
            a: g1(&proof.pi_a, "pi_a")?,
            b: g2(&proof.pi_b, "pi_b")?,
            c: g1(&proof.pi_c, "pi_c")?,
        };
        let inputs = public_inputs
            .iter()
            .map(|v| scalar(*v))
            .collect::<VerifyResult<Vec<_>>>()?;

        let valid = Groth16::<Bn254>::verify_with_processed_vk(&self.pvk, &inputs, &proof)
            .map_err(|e| VerifyError::Rejected(format!("proof verification failed: {}", e)))?;
        if !valid {
            return Err(VerifyError::Rejected("invalid zero-knowledge proof".to_string()));
        }
        Ok(())
    }
}

/// Challenge a JWZ proof must commit to: circom Poseidon over the SHA-256 of
/// the signing input, read little-endian and reduced into the scalar field.
pub fn message_challenge(signing_input: &[u8]) -> VerifyResult<U256> {
    let digest = Sha256::digest(signing_input);
    let message = Fr::from_le_bytes_mod_order(&digest);

    let mut poseidon = Poseidon::<Fr>::new_circom(1)
        .map_err(|e| VerifyError::Malformed(format!("poseidon: {}", e)))?;
    let hash = poseidon
        .hash(&[message])
        .map_err(|e| VerifyError::Malformed(format!("poseidon: {}", e)))?;

    Ok(scalar_to_u256(hash))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Throwaway circuit with the authV2 public signal layout
    //! `[userID, challenge, gistRoot]`, for proving in tests.

    use super::*;
    use ark_groth16::ProvingKey;
    use ark_relations::lc;
    use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, Variable};
    use ark_snark::CircuitSpecificSetupSNARK;

    struct AuthSignalsCircuit {
        signals: [Fr; 3],
    }

    impl ConstraintSynthesizer<Fr> for AuthSignalsCircuit {
        fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> ark_relations::r1cs::Result<()> {
            let [user_id, challenge, gist_root] = self.signals;
            let user_id_var = cs.new_input_variable(|| Ok(user_id))?;
            let challenge_var = cs.new_input_variable(|| Ok(challenge))?;
            let gist_root_var = cs.new_input_variable(|| Ok(gist_root))?;
            let product = cs.new_witness_variable(|| Ok(user_id * challenge))?;

            cs.enforce_constraint(lc!() + user_id_var, lc!() + challenge_var, lc!() + product)?;
            cs.enforce_constraint(lc!() + gist_root_var, lc!() + Variable::One, lc!() + gist_root_var)?;
            Ok(())
        }
    }

    fn fq_string(value: Fq) -> String {
        U256::from_limbs(value.into_bigint().0).to_string()
    }

    fn g1_json(p: &G1Affine) -> G1Json {
        [fq_string(p.x), fq_string(p.y), "1".to_string()]
    }

    fn g2_json(p: &G2Affine) -> G2Json {
        [
            [fq_string(p.x.c0), fq_string(p.x.c1)],
            [fq_string(p.y.c0), fq_string(p.y.c1)],
            ["1".to_string(), "0".to_string()],
        ]
    }

    // Same seeded StdRng as `ark_std::test_rng()`, but with its concrete type
    // exposed so it satisfies the `CryptoRng` bound required by ark-groth16.
    fn test_rng() -> ark_std::rand::rngs::StdRng {
        use ark_std::rand::SeedableRng;
        let seed = [
            1, 0, 0, 0, 23, 0, 0, 0, 200, 1, 0, 0, 210, 30, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0,
        ];
        ark_std::rand::rngs::StdRng::from_seed(seed)
    }

    pub(crate) struct TestCircuit {
        pk: ProvingKey<Bn254>,
    }

    impl TestCircuit {
        pub(crate) fn setup() -> Self {
            let mut rng = test_rng();
            let blank = AuthSignalsCircuit {
                signals: [Fr::from(0u64); 3],
            };
            let (pk, _vk) = Groth16::<Bn254>::circuit_specific_setup(blank, &mut rng).unwrap();
            Self { pk }
        }

        pub(crate) fn key_json(&self) -> SnarkjsVerifyingKey {
            let vk = &self.pk.vk;
            SnarkjsVerifyingKey {
                protocol: GROTH16.to_string(),
                curve: Some("bn128".to_string()),
                n_public: vk.gamma_abc_g1.len() - 1,
                vk_alpha_1: g1_json(&vk.alpha_g1),
                vk_beta_2: g2_json(&vk.beta_g2),
                vk_gamma_2: g2_json(&vk.gamma_g2),
                vk_delta_2: g2_json(&vk.delta_g2),
                ic: vk.gamma_abc_g1.iter().map(g1_json).collect(),
            }
        }

        pub(crate) fn key(&self) -> CircuitKey {
            CircuitKey::from_snarkjs(&self.key_json()).unwrap()
        }

        pub(crate) fn prove(&self, signals: [U256; 3]) -> SnarkjsProof {
            let mut rng = test_rng();
            let circuit = AuthSignalsCircuit {
                signals: signals.map(|s| scalar(s).unwrap()),
            };
            let proof = Groth16::<Bn254>::prove(&self.pk, circuit, &mut rng).unwrap();
            SnarkjsProof {
                pi_a: g1_json(&proof.a),
                pi_b: g2_json(&proof.b),
                pi_c: g1_json(&proof.c),
                protocol: GROTH16.to_string(),
                curve: Some("bn128".to_string()),
            }
        }
    }
}
