//! SFTP backend (libssh2) with password authentication.

use anyhow::{Context, Result, bail};
use ssh2::{ErrorCode, Session, Sftp};
use std::fmt;
use std::io::{self, Read};
use std::net::TcpStream;
use std::path::Path;

use super::transfer::{FileTransfer, TransferSession};

/// `LIBSSH2_FX_NO_SUCH_FILE`
const SFTP_NO_SUCH_FILE: i32 = 2;

pub struct SftpTransfer {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for SftpTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpTransfer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

pub struct SftpSession {
    sftp: Sftp,
    // Kept alive for as long as the SFTP channel is in use.
    _session: Session,
}

impl FileTransfer for SftpTransfer {
    type Session = SftpSession;

    fn connect(&self) -> Result<SftpSession> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .with_context(|| format!("connect to {}:{}", self.host, self.port))?;
        let mut session = Session::new().context("create ssh session")?;
        session.set_tcp_stream(tcp);
        session.handshake().context("ssh handshake")?;
        session
            .userauth_password(&self.user, &self.password)
            .with_context(|| format!("authenticate as {}", self.user))?;
        if !session.authenticated() {
            bail!("authentication failed for {}", self.user);
        }
        let sftp = session.sftp().context("open sftp channel")?;
        Ok(SftpSession {
            sftp,
            _session: session,
        })
    }
}

impl TransferSession for SftpSession {
    fn exists(&mut self, remote_path: &str) -> Result<bool> {
        match self.sftp.stat(Path::new(remote_path)) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("stat {remote_path}")),
        }
    }

    fn create_dir(&mut self, remote_path: &str) -> Result<()> {
        self.sftp
            .mkdir(Path::new(remote_path), 0o755)
            .with_context(|| format!("mkdir {remote_path}"))
    }

    fn upload(&mut self, src: &mut dyn Read, remote_path: &str) -> Result<u64> {
        let mut remote = self
            .sftp
            .create(Path::new(remote_path))
            .with_context(|| format!("create {remote_path}"))?;
        io::copy(src, &mut remote).with_context(|| format!("write {remote_path}"))
    }
}
