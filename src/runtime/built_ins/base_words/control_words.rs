use crate::{
    add_native_immediate_word, add_native_word,
    lang::code::Op,
    runtime::{
        data_structures::value::Value,
        error::{self},
        interpreter::Interpreter,
    },
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Generate a jump label that won't collide with any other label generated during this run of the
/// interpreter.  The labels never escape the compiled byte-code, `resolve_jumps` consumes and
/// clears them, so uniqueness within a single process is all that's required.
fn new_label(tag: &str) -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("__{}_{}", tag, NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Pop a label string left on the data stack by an opening control word for its matching closing
/// word to consume.
fn pop_label(interpreter: &mut dyn Interpreter) -> error::Result<String> {
    Ok(interpreter.pop()?.get_string_val())
}

fn push_label(interpreter: &mut dyn Interpreter, label: String) {
    interpreter.push(Value::String(label));
}

/// `if` -- begin a conditional.  Pops the runtime boolean and, if false, branches past the
/// true-block to the matching `else`, or to `then` if there is none.
///
/// Signature: ` -- `
fn word_if(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let label = new_label("if_else");

    interpreter.insert_user_instruction(None, Op::JumpIfZero(Value::String(label.clone())))?;
    push_label(interpreter, label);

    Ok(())
}

/// `else` -- close the true-block of an `if` and open the false-block.
///
/// Signature: ` -- `
fn word_else(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let else_label = pop_label(interpreter)?;
    let end_label = new_label("if_end");

    interpreter.insert_user_instruction(None, Op::Jump(Value::String(end_label.clone())))?;
    interpreter.insert_user_instruction(None, Op::JumpTarget(Value::String(else_label)))?;
    push_label(interpreter, end_label);

    Ok(())
}

/// `then` -- close an `if` or `if`/`else` block.
///
/// Signature: ` -- `
fn word_then(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let label = pop_label(interpreter)?;

    interpreter.insert_user_instruction(None, Op::JumpTarget(Value::String(label)))
}

/// `begin` -- mark the top of a loop body.  Pairs with `until`, `while`/`repeat`, or `again`.
///
/// Signature: ` -- `
fn word_begin(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let label = new_label("begin");

    interpreter.insert_user_instruction(None, Op::JumpTarget(Value::String(label.clone())))?;
    push_label(interpreter, label);

    Ok(())
}

/// `until` -- close a `begin` block, repeating the body while the runtime boolean is false.
///
/// Signature: ` -- `
fn word_until(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let start_label = pop_label(interpreter)?;

    interpreter.insert_user_instruction(None, Op::JumpIfZero(Value::String(start_label)))
}

/// `again` -- close a `begin` block that repeats unconditionally.  Typically exited via `break`
/// from within an enclosing `loop`, or never.
///
/// Signature: ` -- `
fn word_again(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let start_label = pop_label(interpreter)?;

    interpreter.insert_user_instruction(None, Op::Jump(Value::String(start_label)))
}

/// `while` -- inside a `begin`/`repeat` block, pops the runtime boolean and branches past the rest
/// of the loop (to `repeat`'s exit) when false.
///
/// Signature: ` -- `
fn word_while(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let start_label = pop_label(interpreter)?;
    let end_label = new_label("while_end");

    interpreter.insert_user_instruction(None, Op::JumpIfZero(Value::String(end_label.clone())))?;

    push_label(interpreter, start_label);
    push_label(interpreter, end_label);

    Ok(())
}

/// `repeat` -- close a `begin`/`while` block.
///
/// Signature: ` -- `
fn word_repeat(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let end_label = pop_label(interpreter)?;
    let start_label = pop_label(interpreter)?;

    interpreter.insert_user_instruction(None, Op::Jump(Value::String(start_label)))?;
    interpreter.insert_user_instruction(None, Op::JumpTarget(Value::String(end_label)))
}

/// `loop` -- open a loop frame that `break` and `continue` can target from anywhere in the body.
/// Pairs with `end-loop`.
///
/// Signature: ` -- `
fn word_loop(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let exit_label = new_label("loop_exit");

    interpreter.insert_user_instruction(None, Op::MarkLoopExit(Value::String(exit_label.clone())))?;
    push_label(interpreter, exit_label);

    Ok(())
}

/// `end-loop` -- close a `loop` block.  Repeats the body unless a `break` within it jumps past
/// this point first.
///
/// Signature: ` -- `
fn word_end_loop(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let exit_label = pop_label(interpreter)?;

    interpreter.insert_user_instruction(None, Op::JumpLoopStart)?;
    interpreter.insert_user_instruction(None, Op::UnmarkLoopExit)?;
    interpreter.insert_user_instruction(None, Op::JumpTarget(Value::String(exit_label)))
}

/// `break` -- jump to the exit of the innermost `loop`/`end-loop`.
///
/// Signature: ` -- `
fn word_break(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.insert_user_instruction(None, Op::JumpLoopExit)
}

/// `continue` -- jump back to the start of the innermost `loop`/`end-loop`.
///
/// Signature: ` -- `
fn word_continue(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.insert_user_instruction(None, Op::JumpLoopStart)
}

/// `try` -- open a catch frame protecting the following block.  Pairs with `catch`/`endtry`.
///
/// Signature: ` -- `
fn word_try(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let catch_label = new_label("catch");

    interpreter.insert_user_instruction(None, Op::MarkCatch(Value::String(catch_label.clone())))?;
    push_label(interpreter, catch_label);

    Ok(())
}

/// `catch` -- close the protected block of a `try` and open its handler block.  On entry to the
/// handler the error message is on top of the data stack.
///
/// Signature: ` -- `
fn word_catch(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let catch_label = pop_label(interpreter)?;
    let end_label = new_label("endtry");

    interpreter.insert_user_instruction(None, Op::UnmarkCatch)?;
    interpreter.insert_user_instruction(None, Op::Jump(Value::String(end_label.clone())))?;
    interpreter.insert_user_instruction(None, Op::JumpTarget(Value::String(catch_label)))?;
    push_label(interpreter, end_label);

    Ok(())
}

/// `endtry` -- close a `try`/`catch` block.
///
/// Signature: ` -- `
fn word_endtry(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let end_label = pop_label(interpreter)?;

    interpreter.insert_user_instruction(None, Op::JumpTarget(Value::String(end_label)))
}

/// `variable!` -- read the next token as a name and define a new scoped variable under it.  The
/// word pushes the variable's index onto the stack when later executed; use `!`/`@` to write and
/// read through it.
///
/// Signature: ` -- `
fn word_variable_bang(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = interpreter.next_token_text()?;

    interpreter.insert_user_instruction(None, Op::DefVariable(Value::String(name)))
}

/// `constant!` -- read the next token as a name and define a new scoped constant under it, bound
/// to whatever value is on top of the stack at the point this instruction runs.
///
/// Signature: `value -- `
fn word_constant_bang(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = interpreter.next_token_text()?;

    interpreter.insert_user_instruction(None, Op::DefConstant(Value::String(name)))
}

/// `@` -- read the value held by the variable whose index is on top of the stack.
///
/// Signature: `variable_index -- value`
fn word_read_variable(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let index = interpreter.pop_as_usize()?;
    let value = interpreter.read_variable_at(index)?;

    interpreter.push(value);
    Ok(())
}

/// `!` -- write a value into the variable whose index is on top of the stack.
///
/// Signature: `value variable_index -- `
fn word_write_variable(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let index = interpreter.pop_as_usize()?;
    let value = interpreter.pop()?;

    interpreter.write_variable_at(index, value)
}

/// Register the runtime control-flow words with the interpreter.
pub fn register_control_words(interpreter: &mut dyn Interpreter) {
    add_native_immediate_word!(
        interpreter,
        "if",
        word_if,
        "Begin a conditional.  Branches past the true-block when the test is false.",
        "test -- "
    );

    add_native_immediate_word!(
        interpreter,
        "else",
        word_else,
        "Close the true-block of an if and open its false-block.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "then",
        word_then,
        "Close an if or if/else block.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "begin",
        word_begin,
        "Mark the top of a loop body.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "until",
        word_until,
        "Close a begin block, repeating while the test is false.",
        "test -- "
    );

    add_native_immediate_word!(
        interpreter,
        "again",
        word_again,
        "Close a begin block that repeats unconditionally.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "while",
        word_while,
        "Within a begin/repeat block, branch past the loop when the test is false.",
        "test -- "
    );

    add_native_immediate_word!(
        interpreter,
        "repeat",
        word_repeat,
        "Close a begin/while block.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "loop",
        word_loop,
        "Open a loop body that break/continue can target.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "end-loop",
        word_end_loop,
        "Close a loop block.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "break",
        word_break,
        "Jump to the exit of the innermost loop.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "continue",
        word_continue,
        "Jump back to the start of the innermost loop.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "try",
        word_try,
        "Open a catch frame protecting the following block.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "catch",
        word_catch,
        "Close the protected block of a try and open its handler.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "endtry",
        word_endtry,
        "Close a try/catch block.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "variable!",
        word_variable_bang,
        "Define a new scoped variable named by the next token.",
        " -- "
    );

    add_native_immediate_word!(
        interpreter,
        "constant!",
        word_constant_bang,
        "Define a new scoped constant named by the next token, bound to the top of stack.",
        "value -- "
    );

    add_native_word!(
        interpreter,
        "@",
        word_read_variable,
        "Read the value held by the variable whose index is on top of the stack.",
        "variable_index -- value"
    );

    add_native_word!(
        interpreter,
        "!",
        word_write_variable,
        "Write a value into the variable whose index is on top of the stack.",
        "value variable_index -- "
    );
}
