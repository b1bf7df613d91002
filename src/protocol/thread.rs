use std::{
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{Mutex, MutexGuard, PoisonError},
    thread,
};

use log::{debug, warn};

/// Runs one worker thread per client connection.
///
/// Each worker keeps a clone of its socket so the pool can unblock every in-flight session
/// at shutdown by closing the sockets underneath them.
#[derive(Debug, Default)]
pub struct SessionPool {
    workers: Mutex<Vec<Worker>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `f` on a new worker. `socket` is a handle to the connection `f` serves.
    pub fn execute<F>(&self, socket: TcpStream, f: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let peer = socket.peer_addr()?;
        let closer = socket.try_clone()?;
        let thread = thread::Builder::new()
            .name(format!("session-{peer}"))
            .spawn(move || {
                f();
                // The pool still holds a handle, so dropping the session's own is not enough.
                let _ = closer.shutdown(Shutdown::Both);
            })?;

        let mut workers = self.pruned();
        workers.push(Worker {
            peer,
            socket,
            thread,
        });
        Ok(())
    }

    /// Number of sessions still running.
    pub fn active(&self) -> usize {
        self.pruned().len()
    }

    /// Closes every session socket; blocked reads in the workers return end-of-stream.
    pub fn close_all(&self) {
        for worker in self.pruned().iter() {
            debug!("closing session {}", worker.peer);
            // Already-closed sockets report NotConnected.
            let _ = worker.socket.shutdown(Shutdown::Both);
        }
    }

    /// Waits for every worker to finish.
    pub fn join(&self) {
        let workers: Vec<Worker> = self.workers().drain(..).collect();
        for worker in workers {
            debug!("shutting down worker {}", worker.peer);
            worker.finish();
        }
    }

    fn workers(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Joins finished workers and releases their socket handles.
    fn pruned(&self) -> MutexGuard<'_, Vec<Worker>> {
        let mut workers = self.workers();
        let (finished, running): (Vec<Worker>, Vec<Worker>) =
            workers.drain(..).partition(|w| w.thread.is_finished());
        *workers = running;
        for worker in finished {
            worker.finish();
        }
        workers
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        self.close_all();
        self.join();
    }
}

#[derive(Debug)]
struct Worker {
    peer: SocketAddr,
    socket: TcpStream,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn finish(self) {
        if self.thread.join().is_err() {
            warn!("session {} panicked", self.peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Read,
        net::TcpListener,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use super::*;

    #[test]
    fn close_all_unblocks_readers() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (mut stream, _) = listener.accept().unwrap();

        let pool = SessionPool::new();
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let socket = stream.try_clone().unwrap();
        pool.execute(socket, move || {
            let mut buf = [0; 16];
            let _ = stream.read(&mut buf);
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(pool.active(), 1);

        pool.close_all();
        pool.join();

        assert!(done.load(Ordering::SeqCst));
        assert_eq!(pool.active(), 0);
    }

    #[test]
    fn finished_workers_release_their_sockets() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, _) = listener.accept().unwrap();

        let pool = SessionPool::new();
        pool.execute(stream, || {}).unwrap();

        while pool.active() > 0 {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(pool.workers().is_empty());
    }
}
