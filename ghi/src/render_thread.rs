//! The render thread consumes render commands in the order they were submitted.
//! Anything that must happen between two draws (starting or ending a frame capture) is expressed as a command and enqueued
//! on the same queue as the draws it brackets.

use log::{error, trace};

/// A unit of render thread work.
pub type RenderCommand = Box<dyn FnOnce() + Send + 'static>;

/// A queue of render commands. Commands run in submission order, relative to every other command enqueued on the queue.
pub trait RenderCommandQueue: Send + Sync {
	/// Enqueues a command. `name` identifies the command in logs.
	fn enqueue(&self, name: &'static str, command: RenderCommand);
}

enum Message {
	Command(&'static str, RenderCommand),
	Fence(std::sync::mpsc::SyncSender<()>),
}

/// A dedicated render thread fed by a channel.
pub struct RenderThread {
	sender: Option<std::sync::mpsc::Sender<Message>>,
	worker: Option<std::thread::JoinHandle<()>>,
}

impl RenderThread {
	/// Spawns a render thread with the given name.
	pub fn spawn(name: &str) -> std::io::Result<RenderThread> {
		let (sender, receiver) = std::sync::mpsc::channel::<Message>();

		let worker = std::thread::Builder::new().name(name.to_string()).spawn(move || {
			while let Ok(message) = receiver.recv() {
				match message {
					Message::Command(name, command) => {
						trace!("Executing render command {}", name);
						command();
					}
					Message::Fence(signal) => {
						let _ = signal.send(());
					}
				}
			}
		})?;

		Ok(RenderThread { sender: Some(sender), worker: Some(worker) })
	}

	/// Blocks until every command enqueued before this call has executed.
	pub fn flush(&self) {
		let Some(sender) = &self.sender else { return; };

		let (signal, wait) = std::sync::mpsc::sync_channel(1);

		if sender.send(Message::Fence(signal)).is_ok() {
			let _ = wait.recv();
		}
	}
}

impl RenderCommandQueue for RenderThread {
	fn enqueue(&self, name: &'static str, command: RenderCommand) {
		let Some(sender) = &self.sender else { return; };

		if sender.send(Message::Command(name, command)).is_err() {
			error!("Render thread is gone, dropping render command {}", name);
		}
	}
}

impl Drop for RenderThread {
	fn drop(&mut self) {
		// Closing the channel lets the worker drain the queue and return.
		self.sender.take();

		if let Some(worker) = self.worker.take() {
			if worker.join().is_err() {
				error!("Render thread panicked");
			}
		}
	}
}

/// Runs commands inline, on the calling thread. For hosts that render on their main thread.
pub struct ImmediateQueue;

impl RenderCommandQueue for ImmediateQueue {
	fn enqueue(&self, name: &'static str, command: RenderCommand) {
		trace!("Executing render command {}", name);
		command();
	}
}
