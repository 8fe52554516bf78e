//! Renders the per-host artifacts pushed during provisioning
//!
//! Each renderer takes the tunnel parameters plus the role of the host the
//! artifact is for. The two sides' outputs are mirror images: A's remote is
//! B's local, A's left is B's right.

use gretun_core::types::Role;

/// Parameters shared by every rendered artifact
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub outer_a: &'a str,
    pub outer_b: &'a str,
    pub psk: &'a str,
    pub mtu_outer: u16,
    pub mtu_inner: u16,
}

impl<'a> RenderInput<'a> {
    fn outer(&self, role: Role) -> &'a str {
        match role {
            Role::A => self.outer_a,
            Role::B => self.outer_b,
        }
    }
}

/// Boot script establishing both tunnel layers, written to /etc/rc.local.
///
/// Layer one is a SIT tunnel between the outer IPv4 addresses carrying the
/// fixed 6to4-style IPv6 pair; layer two is GRE over that IPv6, carrying the
/// private IPv4 /30.
pub fn boot_script(input: &RenderInput<'_>, role: Role) -> String {
    let peer = role.peer();
    format!(
        "#!/bin/bash\n\
         ip tunnel add {sit} mode sit remote {peer_outer} local {own_outer}\n\
         ip -6 addr add {own_v6}/64 dev {sit}\n\
         ip link set {sit} mtu {mtu_outer}\n\
         ip link set {sit} up\n\
         ip -6 tunnel add {gre} mode ip6gre remote {peer_v6} local {own_v6}\n\
         ip addr add {own_v4}/30 dev {gre}\n\
         ip link set {gre} mtu {mtu_inner}\n\
         ip link set {gre} up\n\
         exit 0\n",
        sit = role.sit_interface(),
        gre = role.gre_interface(),
        peer_outer = input.outer(peer),
        own_outer = input.outer(role),
        own_v6 = role.inner_v6(),
        peer_v6 = peer.inner_v6(),
        own_v4 = role.inner_v4(),
        mtu_outer = input.mtu_outer,
        mtu_inner = input.mtu_inner,
    )
}

/// strongSwan connection definition encrypting the GRE traffic between the
/// two inner IPv6 addresses. IKEv2, PSK auth, started automatically.
pub fn ipsec_conf(role: Role) -> String {
    let peer = role.peer();
    let lines = [
        "config setup".to_string(),
        "    charondebug=\"none\"".to_string(),
        String::new(),
        "conn gretun".to_string(),
        format!("    left={}", role.inner_v6()),
        format!("    leftid={}", role.ipsec_id()),
        format!("    leftsubnet={}/128", role.inner_v6()),
        format!("    right={}", peer.inner_v6()),
        format!("    rightid={}", peer.ipsec_id()),
        format!("    rightsubnet={}/128", peer.inner_v6()),
        "    authby=secret".to_string(),
        "    auto=start".to_string(),
        "    keyexchange=ikev2".to_string(),
        "    ike=aes256-sha2_256-modp2048!".to_string(),
        "    esp=aes256-sha2_256!".to_string(),
    ];
    lines.join("\n") + "\n"
}

/// The shared-secret line, identical on both hosts
pub fn ipsec_secrets(psk: &str) -> String {
    format!(
        "{} {} : PSK \"{}\"\n",
        Role::A.ipsec_id(),
        Role::B.ipsec_id(),
        psk
    )
}

/// Maintenance script that restarts IPsec and bounces both tunnel
/// interfaces, installed for the daily cron job.
pub fn recycle_script(role: Role) -> String {
    format!(
        "#!/bin/bash\n\
         ipsec restart\n\
         ip link set {gre} down\n\
         ip link set {sit} down\n\
         sleep 1\n\
         ip link set {sit} up\n\
         ip link set {gre} up\n",
        sit = role.sit_interface(),
        gre = role.gre_interface(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RenderInput<'static> {
        RenderInput {
            outer_a: "203.0.113.1",
            outer_b: "203.0.113.2",
            psk: "secret123",
            mtu_outer: 1480,
            mtu_inner: 1424,
        }
    }

    #[test]
    fn test_boot_scripts_are_mirrored() {
        let a = boot_script(&input(), Role::A);
        let b = boot_script(&input(), Role::B);

        // A's local is B's remote on the outer layer
        assert!(a.contains("mode sit remote 203.0.113.2 local 203.0.113.1"));
        assert!(b.contains("mode sit remote 203.0.113.1 local 203.0.113.2"));

        // Each side gets its own inner addresses
        assert!(a.contains("ip -6 addr add 2002:504b:d769::2/64 dev sit64a"));
        assert!(b.contains("ip -6 addr add 2002:504b:d769::1/64 dev sit64b"));
        assert!(a.contains("ip addr add 172.20.40.1/30 dev gre6a"));
        assert!(b.contains("ip addr add 172.20.40.2/30 dev gre6b"));
    }

    #[test]
    fn test_boot_script_mtus() {
        let custom = RenderInput {
            mtu_outer: 1400,
            mtu_inner: 1300,
            ..input()
        };
        let script = boot_script(&custom, Role::A);
        assert!(script.contains("ip link set sit64a mtu 1400"));
        assert!(script.contains("ip link set gre6a mtu 1300"));
    }

    #[test]
    fn test_ipsec_conf_left_right_complementary() {
        let a = ipsec_conf(Role::A);
        let b = ipsec_conf(Role::B);

        assert!(a.contains("left=2002:504b:d769::2"));
        assert!(a.contains("right=2002:504b:d769::1"));
        assert!(a.contains("leftid=@a"));
        assert!(a.contains("rightid=@b"));

        assert!(b.contains("left=2002:504b:d769::1"));
        assert!(b.contains("right=2002:504b:d769::2"));
        assert!(b.contains("leftid=@b"));
        assert!(b.contains("rightid=@a"));

        for conf in [&a, &b] {
            assert!(conf.contains("keyexchange=ikev2"));
            assert!(conf.contains("ike=aes256-sha2_256-modp2048!"));
            assert!(conf.contains("esp=aes256-sha2_256!"));
            assert!(conf.contains("authby=secret"));
            assert!(conf.contains("auto=start"));
        }
    }

    #[test]
    fn test_secrets_line_identical_both_sides() {
        let line = ipsec_secrets("secret123");
        assert_eq!(line, "@a @b : PSK \"secret123\"\n");
    }

    #[test]
    fn test_recycle_script_bounces_interfaces() {
        let script = recycle_script(Role::B);
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("ipsec restart"));
        assert!(script.contains("ip link set gre6b down"));
        assert!(script.contains("ip link set sit64b up"));
    }
}
