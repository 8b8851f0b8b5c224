#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const OBSERVATIONS_CSV: &str = "\
object_id,jd,magpsf,sigmapsf,magzpsci,fid,ra,dec
ZTF21abcdefg,2459000.5,18.0,0.05,26.3,1,10.0,20.0
ZTF21abcdefg,2459001.5,18.2,0.05,26.3,2,10.1,20.1
ZTF21abcdefg,2459002.5,18.4,0.06,26.3,1,9.9,19.9
ZTF21abcdefg,2459003.5,18.6,0.07,26.3,2,10.05,20.05
ZTF21abcdefg,2459004.5,18.8,0.08,26.3,3,9.95,19.95
ZTF21zyxwvut,2459010.5,19.5,0.10,26.2,2,150.0,-5.0
";

/// Stand-in for the remote classifier: answers each `classify` call with a summary of the
/// single light curve it received.
pub struct FakeService {
    pub address: String,
    pub requests: Arc<Mutex<Vec<Value>>>,
    pub connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl Drop for FakeService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start a fake service. The first `hang_ups` requests are read and then the connection is
/// closed without an answer.
pub async fn spawn_service(hang_ups: usize) -> FakeService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("tcp://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let hang_ups = Arc::new(AtomicUsize::new(hang_ups));

    let handle = {
        let requests = Arc::clone(&requests);
        let connections = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(
                    socket,
                    Arc::clone(&requests),
                    Arc::clone(&hang_ups),
                ));
            }
        })
    };

    FakeService {
        address,
        requests,
        connections,
        handle,
    }
}

async fn serve_connection(
    socket: TcpStream,
    requests: Arc<Mutex<Vec<Value>>>,
    hang_ups: Arc<AtomicUsize>,
) {
    let (read, mut write) = socket.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let request: Value = serde_json::from_str(&line).unwrap();
        requests.lock().unwrap().push(request.clone());

        let hang_up = hang_ups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hang_up {
            return;
        }

        let record = &request["params"][0][0];
        let reply = json!({
            "id": request["id"],
            "result": {
                "object_id": record[6],
                "observations": record[0].as_array().map(Vec::len),
                "mwebv": record[8],
                "SNIa": 0.82,
            }
        });
        if write
            .write_all(format!("{}\n", reply).as_bytes())
            .await
            .is_err()
        {
            return;
        }
    }
}

/// Uniform E(B-V) = 0.05 over a coarse all-sky grid.
pub fn write_dust_map(dir: &Path) -> String {
    let path = dir.join("sfd_ebv.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "ra,dec,ebv").unwrap();
    for dec in [-90, -45, 0, 45, 90] {
        for ra in [0, 90, 180, 270] {
            writeln!(file, "{},{},0.05", ra, dec).unwrap();
        }
    }
    path.to_str().unwrap().to_string()
}

pub fn write_config(dir: &Path, address: &str, dust_map_path: &str, retry: &str) -> String {
    let path = dir.join("lc-classify.toml");
    let content = format!(
        r#"
[classify]
default = "{address}"
call_timeout_seconds = 5

[dust_map]
path = "{dust_map_path}"
scaling = 1.0

[retry]
{retry}
"#
    );
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

pub const FAST_RETRY: &str = "initial_interval_ms = 20\nmax_elapsed_seconds = 5";
