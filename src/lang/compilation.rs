use crate::{
    lang::{
        code::{ByteCode, Instruction, Op},
        source_buffer::SourceLocation,
        tokenizing::{parse_number_text, NumberType, Token, TokenList},
    },
    runtime::{
        data_structures::{
            dictionary::{WordContext, WordRuntime, WordVisibility},
            value::{ToValue, Value},
        },
        error::{self, script_error},
        interpreter::Interpreter,
    },
};
use std::collections::HashMap;

/// Where newly generated instructions should land within the current construction's code.  The
/// default is at the end, but a handful of words (structure and array literal builders mostly)
/// need to build their code in reverse.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum InsertionLocation {
    /// New instructions are pushed onto the front of the block.
    AtTop,

    /// New instructions are appended onto the end of the block.  This is the default.
    AtEnd,
}

/// A single in-progress block of byte-code.  One of these exists for every word currently being
/// defined, as well as one for the top level code of the script being compiled.  Nested word
/// definitions and `code.new_block` calls push additional constructions onto the stack kept by
/// the owning `CodeConstructor`.
pub struct Construction {
    /// Where in the original source the word began.
    pub location: SourceLocation,

    /// The name the finished word will be registered under.  Unused for top level code.
    pub name: String,

    /// A human readable description of the word, set with `description:`.
    pub description: String,

    /// The word's stack signature, set with `signature:`.
    pub signature: String,

    /// Whether the finished word runs immediately at compile time or normally at run time.
    pub runtime: WordRuntime,

    /// Whether the finished word is visible in the dictionary listing.
    pub visibility: WordVisibility,

    /// Whether the interpreter automatically manages the word's variable/dictionary context.
    pub context: WordContext,

    /// The byte-code accumulated so far for this block.
    pub code: ByteCode,
}

impl Construction {
    /// Create a new, empty construction with all of the defaults a freshly started word
    /// definition should have.
    pub fn new() -> Construction {
        Construction {
            location: SourceLocation::default(),
            name: String::new(),
            description: String::new(),
            signature: String::new(),
            runtime: WordRuntime::Normal,
            visibility: WordVisibility::Visible,
            context: WordContext::Managed,
            code: ByteCode::new(),
        }
    }

    /// Create a new construction seeded with an already existing block of code.  Used by
    /// `code.push_stack_block` to hand a previously popped block back to the generator.
    pub fn new_with_code(code: ByteCode) -> Construction {
        let mut construction = Construction::new();
        construction.code = code;
        construction
    }

    /// Resolve all of the jump and mark instruction's labels within this block into relative
    /// instruction offsets.  Once resolved `JumpTarget` instructions carry no further meaning and
    /// their value is cleared to `Value::None`.
    ///
    /// Only a single pass is needed.  We first record the absolute index of every target label,
    /// then walk the code again replacing each label reference with the relative distance from
    /// the referring instruction to its target.
    pub fn resolve_jumps(&mut self) {
        let mut labels = HashMap::new();

        for (index, instruction) in self.code.iter().enumerate() {
            if let Op::JumpTarget(Value::String(label)) = &instruction.op {
                labels.insert(label.clone(), index as i64);
            }
        }

        for (index, instruction) in self.code.iter_mut().enumerate() {
            let index = index as i64;

            match &mut instruction.op {
                Op::MarkLoopExit(value)
                | Op::MarkCatch(value)
                | Op::Jump(value)
                | Op::JumpIfZero(value)
                | Op::JumpIfNotZero(value) => {
                    if let Value::String(label) = value {
                        if let Some(target) = labels.get(label) {
                            *value = Value::Int(target - index);
                        }
                    }
                }

                Op::JumpTarget(value) => {
                    *value = Value::None;
                }

                _ => (),
            }
        }
    }
}

impl Default for Construction {
    fn default() -> Self {
        Construction::new()
    }
}

/// The stack of in-progress code blocks plus the token stream currently being compiled.  One of
/// these exists per nested call to `process_source`/`process_source_file`, so that `include`
/// within a word definition doesn't disturb the outer compile.
pub struct CodeConstructor {
    /// The tokens making up the source being compiled.
    input_tokens: TokenList,

    /// The index of the next token to be read from `input_tokens`.
    current_token: usize,

    /// The stack of in-progress code blocks.  The bottom of the stack is always the top level
    /// code for this source, additional entries are pushed for word definitions and explicit
    /// `code.new_block` calls.
    stack: Vec<Construction>,

    /// Where new instructions should be inserted in the current top of `stack`.
    pub insertion: InsertionLocation,
}

impl CodeConstructor {
    /// Create a new code constructor for a freshly tokenized piece of source.  A single top level
    /// construction is pushed so that words can immediately start emitting instructions without
    /// first calling `construction_new`.
    pub fn new(tokens: TokenList) -> CodeConstructor {
        CodeConstructor {
            input_tokens: tokens,
            current_token: 0,
            stack: vec![Construction::new()],
            insertion: InsertionLocation::AtEnd,
        }
    }

    /// Get the next token from the input stream, advancing past it.  Returns `None` once the
    /// stream is exhausted.
    pub fn next_token(&mut self) -> Option<Token> {
        let token = self.input_tokens.get(self.current_token).cloned();

        if token.is_some() {
            self.current_token += 1;
        }

        token
    }

    /// Push a new, empty construction onto the stack.  Used when starting a new word definition
    /// or an explicit sub-block.
    pub fn construction_new(&mut self) {
        self.stack.push(Construction::new());
    }

    /// Push a new construction already holding a block of code.  Used by `code.push_stack_block`.
    pub fn construction_new_with_code(&mut self, code: ByteCode) {
        self.stack.push(Construction::new_with_code(code));
    }

    /// Pop the top construction off of the stack and hand it to the caller.
    pub fn construction_pop(&mut self) -> error::Result<Construction> {
        self.stack
            .pop()
            .ok_or_else(|| crate::runtime::error::ScriptError::new(None, "Code construction stack underflow.".to_string(), None))
    }

    /// Access the top construction.
    pub fn construction(&self) -> error::Result<&Construction> {
        self.stack
            .last()
            .ok_or_else(|| crate::runtime::error::ScriptError::new(None, "No code construction is currently active.".to_string(), None))
    }

    /// Access the top construction as mutable.
    pub fn construction_mut(&mut self) -> error::Result<&mut Construction> {
        self.stack
            .last_mut()
            .ok_or_else(|| crate::runtime::error::ScriptError::new(None, "No code construction is currently active.".to_string(), None))
    }

    /// Insert an instruction into the current top construction's code, honoring the current
    /// insertion location.
    pub fn push_instruction(&mut self, instruction: Instruction) -> error::Result<()> {
        let construction = self.construction_mut()?;

        match self.insertion {
            InsertionLocation::AtTop => construction.code.push_front(instruction),
            InsertionLocation::AtEnd => construction.code.push_back(instruction),
        }

        Ok(())
    }
}

/// Look up a word, or if not found fall back to treating the token according to its shape.  This
/// is the single point where the compiler decides whether a token is executed immediately (for an
/// immediate word), compiled into an `Execute` instruction (for a normal word), or turned into a
/// literal push instruction (for a number or a string) or a deferred by-name execute (for a word
/// that isn't defined yet, to be resolved at run time).
pub fn process_token(interpreter: &mut dyn Interpreter, token: Token) -> error::Result<()> {
    // String literals are never looked up in the dictionary, everything else might name a word.
    let name = match &token {
        Token::String(_, _) => None,
        Token::Number(_, text) => Some(text.clone()),
        Token::Word(_, text) => Some(text.clone()),
    };

    let found = name.and_then(|name| interpreter.find_word(&name).cloned());

    if let Some(word) = found {
        if let WordRuntime::Immediate = word.runtime {
            interpreter.execute_word(token.location(), &word)
        } else {
            let location = token.location().clone();
            interpreter.insert_user_instruction(
                Some(location),
                Op::Execute(word.handler_index.to_value()),
            )
        }
    } else {
        match token {
            Token::Number(location, text) => match parse_number_text(&text) {
                Some(NumberType::Int(value)) => {
                    interpreter.insert_user_instruction(Some(location), Op::PushConstantValue(Value::Int(value)))
                }
                Some(NumberType::Float(value)) => {
                    interpreter.insert_user_instruction(Some(location), Op::PushConstantValue(Value::Float(value)))
                }
                None => script_error(interpreter, format!("{} is not a valid number.", text)),
            },

            Token::String(location, text) => interpreter
                .insert_user_instruction(Some(location), Op::PushConstantValue(Value::String(text))),

            Token::Word(location, text) => {
                // The word wasn't found, leave it to be resolved by name at run time.  This lets
                // forward references and words defined later in the same file work.
                interpreter.insert_user_instruction(Some(location), Op::Execute(Value::String(text)))
            }
        }
    }
}

/// Compile and immediately execute a fully tokenized piece of source code.  Used both for loading
/// files from disk and for evaluating source entered interactively.
pub fn process_source_from_tokens(tokens: TokenList, interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.context_new(tokens);

    let compiled = (|| -> error::Result<ByteCode> {
        loop {
            let token = interpreter.context_mut().next_token();

            match token {
                Some(token) => process_token(interpreter, token)?,
                None => break,
            }
        }

        let construction = interpreter.context_mut().construction_mut()?;
        construction.resolve_jumps();

        Ok(construction.code.clone())
    })();

    let _ = interpreter.context_drop();

    let code = compiled?;

    interpreter.execute_code("<top-level>", &code)
}
