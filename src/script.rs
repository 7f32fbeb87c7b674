use std::fmt::Write as FmtWrite;
use std::io::{self, BufRead, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::resolve::Configuration;
use crate::*;

/// Lines of the payload, from either the command line or a reader.
///
/// A command line yields a single line: the tokens joined by spaces.
/// A reader yields every line it holds verbatim, line endings included.
pub enum PayloadLines<R> {
    Command(Option<String>),
    Stream(R),
}

impl<R: BufRead> PayloadLines<R> {
    pub fn new(command: &[String], input: R) -> Self {
        if command.is_empty() {
            PayloadLines::Stream(input)
        } else {
            PayloadLines::Command(Some(command.join(" ") + "\n"))
        }
    }
}

impl<R: BufRead> Iterator for PayloadLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            PayloadLines::Command(line) => line.take().map(Ok),
            PayloadLines::Stream(r) => {
                let mut line = String::new();
                match r.read_line(&mut line) {
                    Ok(0) => None,
                    Ok(_) => Some(Ok(line)),
                    Err(e) => Some(Err(e)),
                }
            }
        }
    }
}

/// Everything above the payload: shebang, `#SBATCH` directives and the
/// flavor's preamble.
pub fn render_header(c: &Configuration) -> String {
    let mut s = String::new();
    // Writing to a String cannot fail.
    let _ = write_header(&mut s, c);
    s
}

fn write_header(s: &mut String, c: &Configuration) -> std::fmt::Result {
    write!(s, "{}\n\n", c.flavor.shebang())?;
    writeln!(s, "#SBATCH -J {}", c.job)?;
    writeln!(s, "#SBATCH -A {}", c.account)?;
    writeln!(s, "#SBATCH -o {}", c.out)?;
    writeln!(s, "#SBATCH -p {}", c.partition)?;
    writeln!(s, "#SBATCH --time={}", c.time)?;
    if c.exclusive {
        writeln!(s, "#SBATCH --exclusive")?;
    }
    if c.gpu {
        writeln!(s, "#SBATCH --nodes={}", c.gpu_nodes)?;
        writeln!(s, "#SBATCH --gres={}", c.gpu_gres)?;
    }
    writeln!(s)?;

    if c.flavor.has_preamble() {
        write!(s, "set -Eeuo pipefail\n\n")?;
        // Harmless for other jobs, needed by beast2.
        let lib = c.library_dir.display();
        writeln!(s, "export BEAGLE_EXTRA_LIBS={}", lib)?;
        write!(s, "export LD_LIBRARY_PATH=$LD_LIBRARY_PATH:{}\n\n", lib)?;
    }
    Ok(())
}

pub fn render<W, I>(c: &Configuration, payload: I, out: &mut W) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = io::Result<String>>,
{
    out.write_all(render_header(c).as_bytes())?;
    for line in payload {
        let line = line.context("failed to read commands from standard input")?;
        out.write_all(line.as_bytes())?;
    }
    out.flush()?;
    Ok(())
}

fn runtime_dir() -> PathBuf {
    PathBuf::from(format!("/run/user/{}", unsafe { libc::geteuid() }))
}

/// A submission script on disk.  Removed when dropped unless kept.
pub struct ScriptFile {
    file: NamedTempFile,
}

impl ScriptFile {
    /// Creates an empty script in `dir`.  Without a directory the per-user
    /// runtime directory is tried first, then the system temporary directory.
    pub fn create(dir: Option<&Path>, flavor: Flavor) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sbatch-commands-").suffix(flavor.suffix());

        let file = match dir {
            Some(d) => builder
                .tempfile_in(d)
                .with_context(|| format!("failed to create temp file in {:?}", d))?,
            None => builder
                .tempfile_in(runtime_dir())
                .or_else(|_| builder.tempfile())
                .context("failed to create temp file")?,
        };
        log::info!("Writing submission script to {}", file.path().display());
        Ok(ScriptFile { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn as_file_mut(&mut self) -> &mut std::fs::File {
        self.file.as_file_mut()
    }

    /// sbatch refuses scripts that are not executable.
    pub fn make_executable(&self) -> Result<()> {
        let perms = std::fs::Permissions::from_mode(0o755);
        std::fs::set_permissions(self.path(), perms)
            .with_context(|| format!("failed to chmod {:?}", self.path()))
    }

    /// Persists the file and returns its path if `keep` is set, deletes it
    /// otherwise.
    pub fn finish(self, keep: bool) -> Result<Option<PathBuf>> {
        if keep {
            let (_, path) = self
                .file
                .keep()
                .context("failed to keep submission script")?;
            log::info!("Keeping {}", path.display());
            Ok(Some(path))
        } else {
            let path = self.path().to_path_buf();
            self.file
                .close()
                .with_context(|| format!("failed to remove {:?}", path))?;
            log::info!("Removed {}", path.display());
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{resolve, Flags};
    use clap::Parser;
    use std::io::Cursor;

    fn config(args: &[&str]) -> Configuration {
        let flags = Flags::parse_from(std::iter::once("sbatch-run").chain(args.iter().copied()));
        let settings = Settings {
            tools_root: "/bt".into(),
            ..Default::default()
        };
        resolve(&flags, &settings, "sbatch-run").unwrap()
    }

    fn rendered(args: &[&str], stdin: &str) -> String {
        let c = config(args);
        let mut out = vec![];
        render(&c, PayloadLines::new(&c.command, Cursor::new(stdin)), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn directives(script: &str) -> Vec<&str> {
        script.lines().filter(|l| l.starts_with("#SBATCH")).collect()
    }

    #[test]
    fn cpu_script() {
        let s = rendered(&["--job", "j1", "echo", "hello", "world"], "");
        assert_eq!(
            s,
            "#!/bin/bash\n\
             \n\
             #SBATCH -J j1\n\
             #SBATCH -A ACORG-SL2-CPU\n\
             #SBATCH -o slurm-%A.out\n\
             #SBATCH -p skylake\n\
             #SBATCH --time=1:00:00\n\
             \n\
             set -Eeuo pipefail\n\
             \n\
             export BEAGLE_EXTRA_LIBS=/bt/root/usr/local/lib\n\
             export LD_LIBRARY_PATH=$LD_LIBRARY_PATH:/bt/root/usr/local/lib\n\
             \n\
             echo hello world\n"
        );
    }

    #[test]
    fn gpu_directives() {
        let s = rendered(&["--gpu", "nvidia-smi"], "");
        assert_eq!(
            directives(&s),
            [
                "#SBATCH -J sbatch-run",
                "#SBATCH -A DSMITH-SL2-GPU",
                "#SBATCH -o slurm-%A.out",
                "#SBATCH -p pascal",
                "#SBATCH --time=11:50:00",
                "#SBATCH --exclusive",
                "#SBATCH --nodes=1",
                "#SBATCH --gres=gpu:4",
            ]
        );
    }

    #[test]
    fn one_directive_per_parameter() {
        let combos: &[&[&str]] = &[
            &[],
            &["--exclusive"],
            &["--gpu"],
            &["--gpu", "--account", "X"],
            &["--exclusive", "--partition", "p", "--time", "5"],
        ];
        for flags in combos {
            let mut args = flags.to_vec();
            args.push("true");
            let s = rendered(&args, "");
            let d = directives(&s);
            for prefix in ["#SBATCH -J ", "#SBATCH -A ", "#SBATCH -o ", "#SBATCH -p ", "#SBATCH --time="] {
                assert_eq!(d.iter().filter(|l| l.starts_with(prefix)).count(), 1, "{:?}", flags);
            }
            let exclusive = flags.contains(&"--exclusive") || flags.contains(&"--gpu");
            assert_eq!(d.contains(&"#SBATCH --exclusive"), exclusive);
            assert_eq!(d.iter().any(|l| l.starts_with("#SBATCH --gres")), flags.contains(&"--gpu"));
        }
    }

    #[test]
    fn explicit_account_with_gpu() {
        let s = rendered(&["--gpu", "--account", "X", "true"], "");
        assert!(directives(&s).contains(&"#SBATCH -A X"));
    }

    #[test]
    fn payload_from_args_is_joined_verbatim() {
        let s = rendered(&["grep", "-c", "a  b", "file"], "ignored\n");
        assert!(s.ends_with("\n\ngrep -c a  b file\n"));
        assert!(!s.contains("ignored"));
    }

    #[test]
    fn payload_from_stream_is_verbatim() {
        let stdin = "cd /data\n  ./run --x 1\n\nlast line without newline";
        let s = rendered(&[], stdin);
        let header = render_header(&config(&[]));
        assert_eq!(s, header + stdin);
    }

    #[test]
    fn classic_flavor() {
        let s = rendered(&["--flavor", "classic", "ls"], "");
        assert!(s.starts_with("#!/usr/bin/env bash\n\n#SBATCH -J "));
        assert!(!s.contains("set -Eeuo"));
        assert!(!s.contains("export "));
        assert!(s.ends_with("#SBATCH --time=1:00:00\n\nls\n"));
    }

    #[test]
    fn script_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();

        let f = ScriptFile::create(Some(dir.path()), Flavor::Current).unwrap();
        f.make_executable().unwrap();
        let path = f.path().to_path_buf();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("sbatch-commands-") && name.ends_with(".sh"));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(f.finish(false).unwrap(), None);
        assert!(!path.exists());

        let f = ScriptFile::create(Some(dir.path()), Flavor::Classic).unwrap();
        let kept = f.finish(true).unwrap().unwrap();
        assert!(kept.exists());
        assert_eq!(kept.extension().unwrap(), "sbatch");
    }

    #[test]
    fn explicit_dir_must_be_usable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-there");
        assert!(ScriptFile::create(Some(&missing), Flavor::Current).is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn implicit_dir_falls_back() {
        let f = ScriptFile::create(None, Flavor::Current).unwrap();
        assert!(f.path().exists());
        f.finish(false).unwrap();
    }
}
