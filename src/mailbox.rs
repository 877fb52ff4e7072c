//! Buzón de una sola plaza entre el hilo del detector y el pipeline.
//!
//! El productor sobrescribe el frame no consumido: el consumidor siempre ve
//! la pose más reciente y nunca una cola de frames atrasados.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};

/// Resultado de un sondeo del consumidor
#[derive(Debug, Clone, PartialEq)]
pub enum Poll<T> {
    /// Frame nuevo desde el último sondeo
    Fresh(T),
    /// Nada nuevo: el pipeline debe recorrer el camino de frame perdido
    Stale,
    /// El productor terminó y no queda nada por leer
    Closed,
}

/// Crea un buzón vacío
pub fn mailbox<T>() -> (Publisher<T>, Subscriber<T>) {
    let (tx, rx) = bounded(1);
    (
        Publisher {
            tx,
            evict: rx.clone(),
            overwritten: 0,
        },
        Subscriber { rx },
    )
}

pub struct Publisher<T> {
    tx: Sender<T>,
    /// Extremo de lectura propio para desalojar el frame viejo
    evict: Receiver<T>,
    overwritten: u64,
}

impl<T> Publisher<T> {
    /// Deja `value` en el buzón. Devuelve true si pisó un frame sin leer.
    ///
    /// Nunca bloquea. El productor conserva su propio extremo de lectura, así
    /// que el canal no se desconecta aunque el consumidor termine.
    pub fn publish(&mut self, value: T) -> bool {
        let mut value = value;
        let mut replaced = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return replaced,
                Err(TrySendError::Full(back)) | Err(TrySendError::Disconnected(back)) => {
                    value = back;
                    // el consumidor pudo vaciarlo entre medias: entonces no hay nada que tirar
                    if self.evict.try_recv().is_ok() {
                        replaced = true;
                        self.overwritten += 1;
                    }
                }
            }
        }
    }

    /// Frames descartados sin que el consumidor llegara a verlos
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}

pub struct Subscriber<T> {
    rx: Receiver<T>,
}

impl<T> Subscriber<T> {
    /// Sondeo sin bloqueo
    pub fn poll(&self) -> Poll<T> {
        match self.rx.try_recv() {
            Ok(v) => Poll::Fresh(v),
            Err(TryRecvError::Empty) => Poll::Stale,
            Err(TryRecvError::Disconnected) => Poll::Closed,
        }
    }

    /// Espera como mucho `timeout` a un frame nuevo
    pub fn poll_timeout(&self, timeout: Duration) -> Poll<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Poll::Fresh(v),
            Err(RecvTimeoutError::Timeout) => Poll::Stale,
            Err(RecvTimeoutError::Disconnected) => Poll::Closed,
        }
    }
}
