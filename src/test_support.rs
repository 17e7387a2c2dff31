//! Fake external tools for tests.
//!
//! Scripts are run as `/bin/sh <script>` rather than executed directly, so a
//! freshly written file is never exec'd while another thread may still hold a
//! write handle on it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::configuration::ExternalCommand;

pub fn sh_script(dir: &Path, name: &str, body: &str) -> ExternalCommand {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    ExternalCommand::new("/bin/sh").with_args([path.to_string_lossy().into_owned()])
}

/// Stand-in for `ssh-keygen -t ed25519 -f <path> -N ""`.
///
/// Refuses to overwrite an existing key, like the real tool does without a tty.
pub fn fake_keygen(dir: &Path) -> ExternalCommand {
    sh_script(
        dir,
        "fake-keygen.sh",
        r#"out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -f) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
[ -n "$out" ] || { echo "no -f given" >&2; exit 1; }
if [ -e "$out" ] || [ -e "$out.pub" ]; then echo "$out already exists" >&2; exit 1; fi
echo "PRIVATE KEY $$" > "$out"
echo "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAA$$ handoff" > "$out.pub"
echo "Your identification has been saved in $out"
"#,
    )
}

/// Key generator that exits with `rc` and writes nothing.
pub fn broken_keygen(dir: &Path, rc: i32) -> ExternalCommand {
    sh_script(
        dir,
        "broken-keygen.sh",
        &format!("echo 'keygen exploded' >&2\nexit {}\n", rc),
    )
}

/// Stand-in for `ansible-playbook -i <inventory> <playbook> --extra-vars @<vars>`.
///
/// Appends the playbook file name to `calls` and exits with `transfer_rc` or
/// `cleanup_rc` depending on which playbook it was given.
pub fn fake_automation(dir: &Path, transfer_rc: i32, cleanup_rc: i32) -> (ExternalCommand, PathBuf) {
    let calls = dir.join("calls.txt");
    let body = format!(
        r#"playbook="$3"
echo "$(basename "$playbook")" >> '{calls}'
echo "PLAY [$playbook] inventory=$2 vars=$5"
echo "diagnostic on stderr" >&2
case "$playbook" in
  *cleanup*) exit {cleanup_rc} ;;
  *) exit {transfer_rc} ;;
esac
"#,
        calls = calls.display(),
        cleanup_rc = cleanup_rc,
        transfer_rc = transfer_rc,
    );
    (sh_script(dir, "fake-automation.sh", &body), calls)
}

/// Writes `len` bytes to `path`, creating parent directories.
pub fn write_sized(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![b'x'; len]).unwrap();
}
