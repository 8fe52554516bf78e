//! Builds the shell command sequences run on each host
//!
//! Commands are plain strings handed to the remote executor one at a time.
//! Rendered file content is embedded inside single quotes; a PSK containing
//! a single quote will break the tee command, which is accepted verbatim
//! like every other input.

use gretun_core::types::Role;

use crate::render::{self, RenderInput};

/// Where the maintenance script is installed on both hosts
pub const RECYCLE_PATH: &str = "/usr/local/bin/gretun-recycle.sh";

const RC_LOCAL: &str = "/etc/rc.local";
const IPSEC_CONF: &str = "/etc/ipsec.conf";
const IPSEC_SECRETS: &str = "/etc/ipsec.secrets";

/// Package and kernel-module preparation, run once per host after both
/// credential sets are verified.
pub fn prereq_commands() -> Vec<String> {
    vec![
        "sudo apt update && sudo apt upgrade -y".to_string(),
        "sudo modprobe ip_gre".to_string(),
        "sudo modprobe ip6gre".to_string(),
        "lsmod | grep gre".to_string(),
        "sudo apt install strongswan strongswan-starter -y".to_string(),
    ]
}

/// The full per-host apply sequence: boot script, IPsec config and secrets,
/// service start, maintenance script. Order matters; the boot script must
/// have created the interfaces before strongSwan binds to them.
pub fn apply_commands(input: &RenderInput<'_>, role: Role) -> Vec<String> {
    vec![
        write_file(RC_LOCAL, &render::boot_script(input, role)),
        format!("sudo chmod +x {}", RC_LOCAL),
        format!("sudo bash {}", RC_LOCAL),
        write_file(IPSEC_CONF, &render::ipsec_conf(role)),
        write_file(IPSEC_SECRETS, &render::ipsec_secrets(input.psk)),
        "sudo systemctl enable strongswan-starter".to_string(),
        "sudo systemctl start strongswan-starter".to_string(),
        write_file(RECYCLE_PATH, &render::recycle_script(role)),
        format!("sudo chmod +x {}", RECYCLE_PATH),
    ]
}

/// Append the daily recycle job to the host's crontab, keeping whatever
/// entries already exist.
pub fn schedule_command(hour: u8) -> String {
    format!(
        "(crontab -l 2>/dev/null; echo '0 {} * * * {} >/dev/null 2>&1') | crontab -",
        hour, RECYCLE_PATH
    )
}

/// Best-effort teardown of everything the apply sequence created. One
/// command per artifact, so a failure names the exact file it was removing.
/// Interface deletion and the crontab clear tolerate already-absent state;
/// `crontab -r` drops the whole crontab, including entries this tool never
/// wrote.
pub fn cleanup_commands(role: Role) -> Vec<String> {
    vec![
        format!("sudo rm -f {}", RC_LOCAL),
        format!("sudo rm -f {}", IPSEC_CONF),
        format!("sudo rm -f {}", IPSEC_SECRETS),
        format!("sudo rm -f {}", RECYCLE_PATH),
        format!("sudo ip tunnel del {} || true", role.gre_interface()),
        format!("sudo ip tunnel del {} || true", role.sit_interface()),
        "crontab -r || true".to_string(),
    ]
}

fn write_file(path: &str, content: &str) -> String {
    format!("echo '{}' | sudo tee {} > /dev/null", content, path)
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
    fn test_prereq_installs_strongswan() {
        let cmds = prereq_commands();
        assert!(cmds.iter().any(|c| c.contains("modprobe ip6gre")));
        assert!(cmds
            .last()
            .is_some_and(|c| c.contains("apt install strongswan strongswan-starter -y")));
    }

    #[test]
    fn test_apply_order() {
        let cmds = apply_commands(&input(), Role::A);

        let boot = cmds.iter().position(|c| c.contains("/etc/rc.local")).unwrap();
        let start = cmds
            .iter()
            .position(|c| c.contains("systemctl start strongswan-starter"))
            .unwrap();
        let recycle = cmds.iter().position(|c| c.contains(RECYCLE_PATH)).unwrap();

        assert!(boot < start, "interfaces must exist before strongSwan starts");
        assert!(start < recycle);
    }

    #[test]
    fn test_apply_embeds_rendered_content() {
        let cmds = apply_commands(&input(), Role::B);
        assert!(cmds
            .iter()
            .any(|c| c.contains("mode sit remote 203.0.113.1 local 203.0.113.2")));
        assert!(cmds.iter().any(|c| c.contains("@a @b : PSK \"secret123\"")));
    }

    #[test]
    fn test_schedule_preserves_existing_crontab() {
        let cmd = schedule_command(3);
        assert!(cmd.contains("crontab -l 2>/dev/null"));
        assert!(cmd.contains("0 3 * * * /usr/local/bin/gretun-recycle.sh >/dev/null 2>&1"));
        assert!(cmd.ends_with("| crontab -"));
    }

    #[test]
    fn test_cleanup_removes_each_artifact_separately() {
        let cmds = cleanup_commands(Role::A);
        assert_eq!(cmds[0], "sudo rm -f /etc/rc.local");
        assert_eq!(cmds[1], "sudo rm -f /etc/ipsec.conf");
        assert_eq!(cmds[2], "sudo rm -f /etc/ipsec.secrets");
        assert_eq!(cmds[3], format!("sudo rm -f {}", RECYCLE_PATH));
    }

    #[test]
    fn test_cleanup_tolerates_missing_tunnel_state() {
        let cmds = cleanup_commands(Role::A);
        assert!(cmds.iter().any(|c| c == "sudo ip tunnel del gre6a || true"));
        assert!(cmds.iter().any(|c| c == "sudo ip tunnel del sit64a || true"));
        assert_eq!(cmds.last().map(String::as_str), Some("crontab -r || true"));
    }
}
