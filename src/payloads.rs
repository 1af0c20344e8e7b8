//! Application-level UDP probe payloads.
//!
//! Several UDP services stay silent unless the datagram is a well-formed request
//! for their protocol, so the probe for those ports carries a real query. These
//! byte sequences are fixed and must not change.

/// DNS standard query for `example.com`, type A, class IN, transaction id 0x001e.
pub static DNS_QUERY: [u8; 29] = [
    0x00, 0x1e, // transaction id
    0x01, 0x00, // flags: standard query, recursion desired
    0x00, 0x01, // questions
    0x00, 0x00, // answer RRs
    0x00, 0x00, // authority RRs
    0x00, 0x00, // additional RRs
    0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', //
    0x03, b'c', b'o', b'm', //
    0x00, // root label
    0x00, 0x01, // type A
    0x00, 0x01, // class IN
];

/// NTP v3 client request: LI=0, VN=3, Mode=3, everything else zero.
pub static NTP_REQUEST: [u8; 48] = ntp_request();

/// SNMPv1 GetRequest for sysDescr.0 with community `public`.
pub static SNMP_GET_REQUEST: [u8; 40] = [
    0x30, 0x26, // SEQUENCE
    0x02, 0x01, 0x00, // version: 1
    0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', // community
    0xa0, 0x19, // GetRequest PDU
    0x02, 0x01, 0x01, // request id
    0x02, 0x01, 0x00, // error status
    0x02, 0x01, 0x00, // error index
    0x30, 0x0e, // varbind list
    0x30, 0x0c, // varbind
    0x06, 0x08, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, // 1.3.6.1.2.1.1.1.0
    0x05, 0x00, // NULL
];

const fn ntp_request() -> [u8; 48] {
    let mut buf = [0u8; 48];
    buf[0] = 0x1b;
    buf
}

/// Payload to send to a UDP `port`.
///
/// Unknown ports get an empty slice; a zero-length datagram is still sent
/// because some services answer any datagram.
pub fn build_payload(port: u16) -> &'static [u8] {
    match port {
        53 => &DNS_QUERY,
        123 => &NTP_REQUEST,
        161 => &SNMP_GET_REQUEST,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_payload_header_and_question() {
        let p = build_payload(53);
        assert_eq!(&p[..4], &[0x00, 0x1e, 0x01, 0x00]);
        assert_eq!(&p[4..12], &[0x00, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&p[p.len() - 4..], &[0x00, 0x01, 0x00, 0x01]);
        assert_eq!(p[p.len() - 5], 0x00);
    }

    #[test]
    fn ntp_payload_is_client_request() {
        let p = build_payload(123);
        assert_eq!(p.len(), 48);
        assert_eq!(p[0], 0x1b);
        assert!(p[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn snmp_payload_length_matches_ber_header() {
        let p = build_payload(161);
        assert_eq!(p.len(), 40);
        assert_eq!(p[0], 0x30);
        assert_eq!(p[1] as usize, p.len() - 2);
        assert_eq!(&p[7..13], b"public");
    }

    #[test]
    fn other_ports_are_empty() {
        assert!(build_payload(0).is_empty());
        assert!(build_payload(54).is_empty());
        assert!(build_payload(65535).is_empty());
    }
}
