use std::{
    collections::{HashMap, VecDeque},
    rc::Rc,
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
};

use crate::runtime::{
    built_ins::{
        base_words::{register_base_words, word_creation_words::ScriptFunction},
        ffi_words::register_ffi_words,
        io_words::register_io_words,
        terminal_words::register_terminal_words,
        user_words::register_user_words,
    },
    data_structures::{
        dictionary::{WordInfo, WordType},
        value::{DeepClone, Value},
    },
    error::{self, script_error, script_error_str},
    interpreter::{
        sorth_interpreter::SorthInterpreter, CodeManagement, Interpreter, WordManagement,
    },
};

/// A wrapper that asserts it is safe to move its contents to another thread even though the
/// wrapped type is not `Send`.
///
/// Every value carried by this wrapper is either freshly deep cloned data headed for a brand new,
/// not yet shared interpreter, or the exclusively-owned bootstrap state of a worker that has not
/// started running yet.  Nothing inside is ever touched by two threads at once.
struct AssertSend<T>(T);

unsafe impl<T> Send for AssertSend<T> {}

/// A blocking, single value at a time FIFO queue shared between a worker thread and its parent.
///
/// Values are only ever read from or written to under the internal mutex, and a value is always
/// moved, never aliased, across the boundary: the sender deep clones before pushing (see
/// `thread.push` / `thread.push-to`), so no two threads ever hold a live reference into the same
/// value graph at the same time.
#[derive(Clone)]
pub struct ValueQueue {
    state: Arc<(Mutex<VecDeque<Value>>, Condvar)>,
}

unsafe impl Send for ValueQueue {}
unsafe impl Sync for ValueQueue {}

impl ValueQueue {
    fn new() -> ValueQueue {
        ValueQueue {
            state: Arc::new((Mutex::new(VecDeque::new()), Condvar::new())),
        }
    }

    pub fn push(&self, value: Value) {
        let (lock, condvar) = &*self.state;
        let mut queue = lock.lock().unwrap();

        queue.push_back(value);
        condvar.notify_one();
    }

    pub fn pop(&self) -> Value {
        let (lock, condvar) = &*self.state;
        let mut queue = lock.lock().unwrap();

        while queue.is_empty() {
            queue = condvar.wait(queue).unwrap();
        }

        queue.pop_front().expect("Queue was just confirmed non-empty.")
    }

    pub fn len(&self) -> usize {
        let (lock, _) = &*self.state;
        lock.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The pair of queues a worker interpreter uses to talk to whoever spawned it.
#[derive(Clone)]
pub struct WorkerChannels {
    /// Where the parent pushes values for the worker to read with `thread.pop`.
    pub input: ValueQueue,

    /// Where the worker pushes values with `thread.push` for the parent to read.
    pub output: ValueQueue,
}

/// Bookkeeping the parent interpreter keeps for a single spawned worker.
struct WorkerEntry {
    handle: Option<JoinHandle<()>>,
    channels: WorkerChannels,
}

/// The table of every worker thread known to the interpreter tree rooted at the top level
/// interpreter created in `main`.  Shared by `Arc` with every interpreter spawned from it, so that
/// a worker spawning its own workers still registers them in the same, single table, matching the
/// rule that workers are only ever tracked by the root parent interpreter.
#[derive(Clone)]
pub struct ThreadRegistryHandle {
    table: Arc<Mutex<ThreadRegistry>>,
}

struct ThreadRegistry {
    next_id: u64,
    workers: HashMap<u64, WorkerEntry>,
}

impl ThreadRegistryHandle {
    pub fn new() -> ThreadRegistryHandle {
        ThreadRegistryHandle {
            table: Arc::new(Mutex::new(ThreadRegistry {
                next_id: 1,
                workers: HashMap::new(),
            })),
        }
    }

    fn register(&self, handle: JoinHandle<()>, channels: WorkerChannels) -> u64 {
        let mut registry = self.table.lock().unwrap();
        let id = registry.next_id;

        registry.next_id += 1;
        registry.workers.insert(
            id,
            WorkerEntry {
                handle: Some(handle),
                channels,
            },
        );

        id
    }

    /// Join a finished worker and, if its output queue has been fully drained, drop its entry
    /// entirely.  Called lazily, any time a worker's id is touched by `thread.push-to`,
    /// `thread.pop-from`, or `.t`.
    fn reap(&self, id: u64) {
        let mut registry = self.table.lock().unwrap();

        let done = if let Some(entry) = registry.workers.get_mut(&id) {
            if let Some(handle) = &entry.handle
                && handle.is_finished()
                && let Some(handle) = entry.handle.take()
            {
                let _ = handle.join();
            }

            entry.handle.is_none() && entry.channels.output.is_empty()
        } else {
            false
        };

        if done {
            registry.workers.remove(&id);
        }
    }

    fn channels(&self, id: u64) -> Option<WorkerChannels> {
        self.reap(id);

        let registry = self.table.lock().unwrap();
        registry.workers.get(&id).map(|entry| entry.channels.clone())
    }

    pub fn list(&self) -> Vec<(u64, bool)> {
        let ids: Vec<u64> = {
            let registry = self.table.lock().unwrap();
            registry.workers.keys().cloned().collect()
        };

        for id in &ids {
            self.reap(*id);
        }

        let registry = self.table.lock().unwrap();

        registry
            .workers
            .iter()
            .map(|(id, entry)| (*id, entry.handle.is_none()))
            .collect()
    }
}

/// Build a brand new interpreter that mirrors `parent`'s dictionary, handler table, variable
/// table and search paths, then replay every word the parent defined at runtime (variables,
/// constants, and scripted `:` ... `;` words) into it.
///
/// The baseline set of native words is rebuilt by calling the very same registration functions
/// `main` uses, in the same order, rather than cloning the parent's handler closures.  Cloning a
/// `Rc<dyn Fn>` across a thread boundary and then letting both sides increment/decrement its
/// reference count without synchronization would be unsound; rebuilding from scratch sidesteps
/// the problem entirely, at the cost of the FFI subsystem starting empty in every worker.
fn bootstrap_worker(parent: &SorthInterpreter, channels: WorkerChannels) -> SorthInterpreter {
    let mut worker = SorthInterpreter::new();

    // Share the parent's thread registry rather than keeping the fresh one `new()` allocated, so
    // a grandchild spawned from inside this worker is still registered with, and reapable by, the
    // root interpreter rather than becoming invisible to it.
    worker.set_thread_registry(parent.thread_registry());

    for path in parent.search_paths() {
        // The path already passed the existence check when added to the parent, and search paths
        // are plain strings, so bypass add_search_path's redundant metadata lookup.
        worker.push_search_path(path.clone());
    }

    register_base_words(&mut worker);
    register_io_words(&mut worker);
    register_terminal_words(&mut worker);
    register_user_words(&mut worker);
    register_ffi_words(&mut worker);

    worker.set_worker_channels(channels);
    replay_dynamic_words(&mut worker, parent);

    worker
}

/// Entry point run on the worker's OS thread.  Looks the entry word up by name in its own,
/// independently built dictionary and runs it to completion.  Any error is swallowed; a script
/// that wants to report failure back to its parent should do so over the output queue with
/// `thread.push`.
fn worker_main(mut worker: SorthInterpreter, entry_name: String) {
    let location = crate::lang::source_buffer::SourceLocation::new_from_path("<thread>");
    let _ = worker.execute_word_named(&location, &entry_name);
}

pub fn thread_new(interpreter: &mut SorthInterpreter, word_index: usize) -> error::Result<u64> {
    let entry_name = match interpreter.word_handler_info(word_index) {
        Some(info) => info.name().clone(),
        None => return script_error(interpreter, format!("Word index {} not found.", word_index)),
    };

    let input = ValueQueue::new();
    let output = ValueQueue::new();

    let worker_channels = WorkerChannels {
        input: input.clone(),
        output: output.clone(),
    };

    let worker = bootstrap_worker(interpreter, worker_channels.clone());
    let registry = interpreter.thread_registry();

    let payload = AssertSend((worker, entry_name));

    let handle = thread::Builder::new()
        .name("sorth-worker".to_string())
        .spawn(move || {
            let AssertSend((worker, entry_name)) = payload;
            worker_main(worker, entry_name);
        })
        .map_err(|err| {
            crate::runtime::error::ScriptError::new(
                interpreter.current_location().clone(),
                format!("Could not spawn thread: {}", err),
                Some(interpreter.call_stack().clone()),
            )
        })?;

    Ok(registry.register(handle, worker_channels))
}

pub fn thread_push_to(
    interpreter: &mut SorthInterpreter,
    thread_id: u64,
    value: Value,
) -> error::Result<()> {
    match interpreter.thread_registry().channels(thread_id) {
        Some(channels) => {
            channels.input.push(value.deep_clone());
            Ok(())
        }
        None => script_error(interpreter, format!("Thread {} not found.", thread_id)),
    }
}

pub fn thread_pop_from(interpreter: &mut SorthInterpreter, thread_id: u64) -> error::Result<Value> {
    match interpreter.thread_registry().channels(thread_id) {
        Some(channels) => Ok(channels.output.pop()),
        None => script_error(interpreter, format!("Thread {} not found.", thread_id)),
    }
}

pub fn thread_push(interpreter: &mut SorthInterpreter, value: Value) -> error::Result<()> {
    match interpreter.worker_channels() {
        Some(channels) => {
            channels.output.push(value.deep_clone());
            Ok(())
        }
        None => script_error_str(interpreter, "Not running within a worker thread."),
    }
}

pub fn thread_pop(interpreter: &mut SorthInterpreter) -> error::Result<Value> {
    match interpreter.worker_channels() {
        Some(channels) => Ok(channels.input.pop()),
        None => script_error_str(interpreter, "Not running within a worker thread."),
    }
}

/// Replay every word `parent` defined at runtime on top of its own baseline (variable and
/// constant accessors, and scripted `:` ... `;` words) into `self`, in the order they were
/// originally defined.  Relies on `self` having registered the exact same baseline native words,
/// in the same order, so that handler indices line up once replay continues past the baseline.
pub(crate) fn replay_dynamic_words(worker: &mut SorthInterpreter, parent: &SorthInterpreter) {
    let merged = parent.dictionary().get_merged();
    let mut by_index: HashMap<usize, &WordInfo> = HashMap::new();

    for info in merged.values() {
        by_index.insert(info.handler_index, info);
    }

    enum Entry {
        Variable { variable_index: usize, name: String },
        Constant { name: String, value: Value },
        Scripted(WordInfo),
    }

    let mut entries: Vec<(usize, Entry)> = Vec::new();

    for (handler_index, variable_index, name) in parent.variable_accessors() {
        entries.push((
            *handler_index,
            Entry::Variable {
                variable_index: *variable_index,
                name: name.clone(),
            },
        ));
    }

    for (handler_index, name, value) in parent.constant_accessors() {
        entries.push((
            *handler_index,
            Entry::Constant {
                name: name.clone(),
                value: value.clone(),
            },
        ));
    }

    for (handler_index, _, _) in parent.scripted_words() {
        if let Some(info) = by_index.get(handler_index)
            && info.word_type == WordType::Scripted
        {
            entries.push((*handler_index, Entry::Scripted((*info).clone())));
        }
    }

    entries.sort_by_key(|(handler_index, _)| *handler_index);

    for (handler_index, entry) in entries {
        match entry {
            Entry::Variable { variable_index, name } => {
                let new_index = worker.register_variable_accessor(name);
                let value = parent.variable_value(variable_index).deep_clone();
                worker.set_variable_value(new_index, value);
            }

            Entry::Constant { name, value } => {
                worker.register_constant_accessor(name, value.deep_clone());
            }

            Entry::Scripted(info) => {
                let code = parent
                    .scripted_words()
                    .iter()
                    .find(|(index, _, _)| *index == handler_index)
                    .map(|(_, context, code)| (context.clone(), code.clone()));

                if let Some((context, code)) = code {
                    let function = Rc::new(ScriptFunction::new(
                        info.name.clone(),
                        context.clone(),
                        code.clone(),
                    ));

                    worker.add_word(
                        info.location.path().clone(),
                        info.location.line(),
                        info.location.column(),
                        info.name.clone(),
                        function,
                        info.description.clone(),
                        info.signature.clone(),
                        info.runtime.clone(),
                        info.visibility.clone(),
                        WordType::Scripted,
                    );

                    if let Some(new_word) = worker.find_word(&info.name) {
                        let new_handler_index = new_word.handler_index;
                        worker.record_scripted_word(new_handler_index, context, code);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{data_structures::value::Value, interpreter::CodeManagement};

    /// SPEC_FULL.md §8 scenario 6: a worker that echoes back its input plus one, driven entirely
    /// through the `thread.*` words a script would use.
    #[test]
    fn worker_echoes_incremented_value() {
        let mut interpreter = SorthInterpreter::new();
        register_base_words(&mut interpreter);

        interpreter
            .process_source(
                "<test>",
                "\
                : echo thread.pop 1 + thread.push ; \
                `echo thread.new \
                5 over thread.push-to \
                thread.pop-from",
            )
            .expect("source should compile and run without error");

        assert_eq!(interpreter.pop().unwrap(), Value::Int(6));
    }
}
