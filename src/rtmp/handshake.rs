// RTMP handshake utils

use hmac::{Hmac, Mac};
use sha2::Sha256;

use rand::{rngs::StdRng, RngCore, SeedableRng};

use std::sync::LazyLock;

use crate::{log::Logger, log_debug};

use super::{
    GENUINE_FMS, GENUINE_FP, MESSAGE_FORMAT_0, MESSAGE_FORMAT_1, MESSAGE_FORMAT_2, RANDOM_CRUD,
    RTMP_SIG_SIZE, RTMP_VERSION, SHA256DL, SHA256K,
};

// Key used to sign the S2 challenge response

static GENUINE_FMS_PLUS_CRUD: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let mut v: Vec<u8> = Vec::with_capacity(GENUINE_FMS.len() + RANDOM_CRUD.len());

    v.extend(GENUINE_FMS.bytes());
    v.extend(RANDOM_CRUD);

    v
});

/// Generates full RTMP handshake response
/// client_signature - Client signature (C1)
/// logger - Logger of the RTMP session
pub fn generate_s0_s1_s2(client_signature: &[u8], logger: &Logger) -> Result<Vec<u8>, ()> {
    let msg_format = detect_client_message_format(client_signature, logger)?;

    let mut all_bytes: Vec<u8> = Vec::with_capacity(1 + 2 * RTMP_SIG_SIZE);

    if msg_format == MESSAGE_FORMAT_0 {
        log_debug!(logger, "Using basic handshake");

        all_bytes.push(RTMP_VERSION);
        all_bytes.extend(client_signature);
        all_bytes.extend(client_signature);
    } else {
        log_debug!(logger, "Using S1S2 handshake");

        let s1 = generate_s1(msg_format, logger)?;
        let s2 = generate_s2(msg_format, client_signature, logger)?;

        all_bytes.push(RTMP_VERSION);
        all_bytes.extend(s1);
        all_bytes.extend(s2);
    }

    Ok(all_bytes)
}

/// Generates RTMP handshake response (S1)
/// msg_format - Message format
/// logger - Logger of the RTMP session
pub fn generate_s1(msg_format: u32, logger: &Logger) -> Result<Vec<u8>, ()> {
    let mut handshake_bytes: Vec<u8> = vec![0, 0, 0, 0, 1, 2, 3, 4];

    handshake_bytes.resize(RTMP_SIG_SIZE, 0);

    let mut rng = StdRng::from_os_rng();

    rng.fill_bytes(&mut handshake_bytes[8..]);

    let server_digest_offset = if msg_format == MESSAGE_FORMAT_1 {
        get_client_genuine_const_digest_offset(&handshake_bytes[8..12])
    } else {
        get_server_genuine_const_digest_offset(&handshake_bytes[772..776])
    };

    if handshake_bytes.len() < server_digest_offset + SHA256DL {
        log_debug!(
            logger,
            format!(
                "Invalid digest offset. Expected at most {}, but found {}",
                handshake_bytes.len() - SHA256DL,
                server_digest_offset
            )
        );

        return Err(());
    }

    // The digest covers the signature minus the digest slot

    let mut msg: Vec<u8> = Vec::with_capacity(RTMP_SIG_SIZE - SHA256DL);

    msg.extend(&handshake_bytes[0..server_digest_offset]);
    msg.extend(&handshake_bytes[server_digest_offset + SHA256DL..]);

    let h = calc_hmac(&msg, GENUINE_FMS.as_bytes());

    if h.len() != SHA256DL {
        log_debug!(
            logger,
            format!(
                "HMAC size invalid. Expected {}, but found {}",
                SHA256DL,
                h.len()
            )
        );

        return Err(());
    }

    handshake_bytes[server_digest_offset..server_digest_offset + SHA256DL].copy_from_slice(&h);

    Ok(handshake_bytes)
}

/// Generates RTMP handshake response (S2)
/// msg_format - Message format
/// client_signature - Client signature (C1)
/// logger - Logger of the RTMP session
pub fn generate_s2(
    msg_format: u32,
    client_signature: &[u8],
    logger: &Logger,
) -> Result<Vec<u8>, ()> {
    if client_signature.len() < 776 {
        log_debug!(
            logger,
            format!(
                "Client signature is too small. Expected at least 776, but found {}",
                client_signature.len()
            )
        );
        return Err(());
    }

    let challenge_key_offset = if msg_format == MESSAGE_FORMAT_1 {
        get_client_genuine_const_digest_offset(&client_signature[8..12])
    } else {
        get_server_genuine_const_digest_offset(&client_signature[772..776])
    };

    if client_signature.len() < challenge_key_offset + SHA256K {
        log_debug!(
            logger,
            format!(
                "Client signature is too small. Expected at least {}, but found {}",
                challenge_key_offset + SHA256K,
                client_signature.len()
            )
        );
        return Err(());
    }

    let challenge_key = &client_signature[challenge_key_offset..challenge_key_offset + SHA256K];

    let mut random_bytes = vec![0; RTMP_SIG_SIZE - SHA256DL];

    let mut rng = StdRng::from_os_rng();

    rng.fill_bytes(&mut random_bytes);

    let h = calc_hmac(challenge_key, &GENUINE_FMS_PLUS_CRUD);
    let signature = calc_hmac(&random_bytes, &h);

    let mut s2_bytes: Vec<u8> = Vec::with_capacity(RTMP_SIG_SIZE);

    s2_bytes.extend(&random_bytes);
    s2_bytes.extend(&signature);

    s2_bytes.resize(RTMP_SIG_SIZE, 0);

    Ok(s2_bytes)
}

/// Calculates HMAC-SHA256
fn calc_hmac(message: &[u8], key: &[u8]) -> Vec<u8> {
    let mut mac: Hmac<Sha256> = Hmac::new_from_slice(key).expect("HMAC can take key of any size");

    mac.update(message);

    mac.finalize().into_bytes().to_vec()
}

/// Compares 2 signatures
/// Returns true only if the 2 signatures are equal
fn compare_signatures(sig1: &[u8], sig2: &[u8]) -> bool {
    if sig1.len() != sig2.len() {
        return false;
    }

    let mut result = true;

    for i in 0..sig1.len() {
        result = result && (sig1[i] == sig2[i]);
    }

    result
}

/// Checks the client digest for a scheme, given its offset in the signature
fn check_client_digest(client_signature: &[u8], digest_offset: usize, logger: &Logger) -> bool {
    if client_signature.len() < digest_offset + SHA256DL {
        log_debug!(
            logger,
            format!(
                "Client signature is too small. Expected at least {}, but found {}",
                digest_offset + SHA256DL,
                client_signature.len()
            )
        );

        return false;
    }

    let mut msg: Vec<u8> = Vec::with_capacity(client_signature.len() - SHA256DL);

    msg.extend(&client_signature[0..digest_offset]);
    msg.extend(&client_signature[digest_offset + SHA256DL..]);

    msg.resize(RTMP_SIG_SIZE - SHA256DL, 0);

    let computed_signature = calc_hmac(&msg, GENUINE_FP.as_bytes());
    let provided_signature = &client_signature[digest_offset..digest_offset + SHA256DL];

    compare_signatures(&computed_signature, provided_signature)
}

/// Detects message format from the client signature
/// If no digest scheme matches, the simple format is assumed
fn detect_client_message_format(client_signature: &[u8], logger: &Logger) -> Result<u32, ()> {
    if client_signature.len() < 776 {
        log_debug!(
            logger,
            format!(
                "Client signature is too small. Expected at least 776, but found {}",
                client_signature.len()
            )
        );
        return Err(());
    }

    let digest_offset_2 = get_server_genuine_const_digest_offset(&client_signature[772..776]);

    if check_client_digest(client_signature, digest_offset_2, logger) {
        return Ok(MESSAGE_FORMAT_2);
    }

    let digest_offset_1 = get_client_genuine_const_digest_offset(&client_signature[8..12]);

    if check_client_digest(client_signature, digest_offset_1, logger) {
        return Ok(MESSAGE_FORMAT_1);
    }

    Ok(MESSAGE_FORMAT_0)
}

/// Gets the digest offset for scheme 0 from its 4 pointer bytes
fn get_client_genuine_const_digest_offset(buf: &[u8]) -> usize {
    if buf.len() < 4 {
        return 0;
    }

    (((buf[0] as usize) + (buf[1] as usize) + (buf[2] as usize) + (buf[3] as usize)) % 728) + 12
}

/// Gets the digest offset for scheme 1 from its 4 pointer bytes
fn get_server_genuine_const_digest_offset(buf: &[u8]) -> usize {
    if buf.len() < 4 {
        return 0;
    }

    (((buf[0] as usize) + (buf[1] as usize) + (buf[2] as usize) + (buf[3] as usize)) % 728) + 776
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogConfig, Logger};

    fn test_logger() -> Logger {
        Logger::new(LogConfig {
            prefix: "".to_string(),
            error_enabled: false,
            warning_enabled: false,
            info_enabled: false,
            debug_enabled: false,
            trace_enabled: false,
        })
    }

    #[test]
    fn test_simple_handshake_echoes_client_signature() {
        let logger = test_logger();

        // A zeroed C1 carries no valid digest, so the simple format is detected
        let c1 = vec![0_u8; RTMP_SIG_SIZE];

        let response = generate_s0_s1_s2(&c1, &logger).expect("handshake error");

        assert_eq!(response.len(), 1 + 2 * RTMP_SIG_SIZE);
        assert_eq!(response[0], RTMP_VERSION);
        assert_eq!(&response[1..1 + RTMP_SIG_SIZE], c1.as_slice());
        assert_eq!(&response[1 + RTMP_SIG_SIZE..], c1.as_slice());
    }

    #[test]
    fn test_digest_handshake() {
        let logger = test_logger();

        // Build a C1 the way a digest-capable client does (scheme 0)
        let mut c1 = vec![0_u8; RTMP_SIG_SIZE];

        let mut rng = StdRng::from_os_rng();
        rng.fill_bytes(&mut c1[8..]);

        let digest_offset = get_client_genuine_const_digest_offset(&c1[8..12]);

        let mut msg: Vec<u8> = Vec::with_capacity(RTMP_SIG_SIZE - SHA256DL);
        msg.extend(&c1[0..digest_offset]);
        msg.extend(&c1[digest_offset + SHA256DL..]);

        let digest = calc_hmac(&msg, GENUINE_FP.as_bytes());
        c1[digest_offset..digest_offset + SHA256DL].copy_from_slice(&digest);

        assert_eq!(
            detect_client_message_format(&c1, &logger),
            Ok(MESSAGE_FORMAT_1)
        );

        let response = generate_s0_s1_s2(&c1, &logger).expect("handshake error");

        assert_eq!(response.len(), 1 + 2 * RTMP_SIG_SIZE);
        assert_eq!(response[0], RTMP_VERSION);

        // S1 must carry a valid server digest at the scheme 0 offset
        let s1 = &response[1..1 + RTMP_SIG_SIZE];
        let s1_digest_offset = get_client_genuine_const_digest_offset(&s1[8..12]);

        let mut s1_msg: Vec<u8> = Vec::with_capacity(RTMP_SIG_SIZE - SHA256DL);
        s1_msg.extend(&s1[0..s1_digest_offset]);
        s1_msg.extend(&s1[s1_digest_offset + SHA256DL..]);

        let expected_s1_digest = calc_hmac(&s1_msg, GENUINE_FMS.as_bytes());

        assert_eq!(
            &s1[s1_digest_offset..s1_digest_offset + SHA256DL],
            expected_s1_digest.as_slice()
        );

        // S2's trailing signature must be keyed by the client digest
        let s2 = &response[1 + RTMP_SIG_SIZE..];

        let challenge_key = &c1[digest_offset..digest_offset + SHA256K];
        let h = calc_hmac(challenge_key, &GENUINE_FMS_PLUS_CRUD);
        let expected_s2_signature = calc_hmac(&s2[0..RTMP_SIG_SIZE - SHA256DL], &h);

        assert_eq!(
            &s2[RTMP_SIG_SIZE - SHA256DL..],
            expected_s2_signature.as_slice()
        );
    }
}
