// Tue Jan 13 2026 - Alex

const MAX_BACKREFS: usize = 10;
const MAX_DEPTH: usize = 32;

/// Decodes MSVC type-descriptor names (`.?AVName@@`) into plain type names.
pub trait Demangler {
    /// Returns `None` when `name` is not a complete type-only encoding.
    fn demangle_type(&self, name: &str) -> Option<String>;

    fn is_type_name(&self, name: &str) -> bool {
        self.demangle_type(name).is_some()
    }
}

/// Built-in decoder for the subset of the MSVC scheme found in RTTI
/// type descriptors. Class keywords are suppressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsvcTypeDemangler;

impl Demangler for MsvcTypeDemangler {
    fn demangle_type(&self, name: &str) -> Option<String> {
        TypeParser::new(name).parse_descriptor_name()
    }
}

/// Calling convention, return type and parameters of a function encoding.
struct FunctionType {
    convention: &'static str,
    /// `None` for constructors and destructors.
    returns: Option<String>,
    params: String,
    noexcept: bool,
}

impl FunctionType {
    fn declare(&self, declarator: &str) -> String {
        let mut out = String::new();
        if let Some(returns) = &self.returns {
            out.push_str(returns);
            out.push(' ');
        }
        out.push_str(declarator);
        out.push('(');
        out.push_str(&self.params);
        out.push(')');
        if self.noexcept {
            out.push_str(" noexcept");
        }
        out
    }
}

struct TypeParser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
    names: Vec<String>,
    types: Vec<String>,
}

impl<'a> TypeParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            depth: 0,
            names: Vec::new(),
            types: Vec::new(),
        }
    }

    fn parse_descriptor_name(mut self) -> Option<String> {
        if !self.eat(b'.') {
            return None;
        }
        if self.input[self.pos..].starts_with(b"?A") {
            self.pos += 2;
        }
        let ty = self.parse_type()?;
        if self.pos != self.input.len() {
            return None;
        }
        Some(ty)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_type(&mut self) -> Option<String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return None;
        }
        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Option<String> {
        let c = self.advance()?;
        let primitive = match c {
            b'C' => "signed char",
            b'D' => "char",
            b'E' => "unsigned char",
            b'F' => "short",
            b'G' => "unsigned short",
            b'H' => "int",
            b'I' => "unsigned int",
            b'J' => "long",
            b'K' => "unsigned long",
            b'M' => "float",
            b'N' => "double",
            b'O' => "long double",
            b'X' => "void",
            b'_' => match self.advance()? {
                b'N' => "bool",
                b'J' => "__int64",
                b'K' => "unsigned __int64",
                b'W' => "wchar_t",
                b'S' => "char16_t",
                b'U' => "char32_t",
                b'Q' => "char8_t",
                _ => return None,
            },
            b'V' | b'U' | b'T' => return self.parse_qualified_name(),
            b'W' => {
                match self.advance()? {
                    b'0'..=b'7' => {}
                    _ => return None,
                }
                return self.parse_qualified_name();
            }
            b'P' => return self.parse_indirection("*", ""),
            b'Q' => return self.parse_indirection("*", " const"),
            b'R' => return self.parse_indirection("*", " volatile"),
            b'S' => return self.parse_indirection("*", " const volatile"),
            b'A' => return self.parse_indirection("&", ""),
            b'$' => return self.parse_extended_type(),
            b'0'..=b'9' => return self.types.get((c - b'0') as usize).cloned(),
            _ => return None,
        };
        Some(primitive.to_string())
    }

    fn parse_extended_type(&mut self) -> Option<String> {
        if !self.eat(b'$') {
            return None;
        }
        match self.advance()? {
            b'Q' => self.parse_indirection("&&", ""),
            b'T' => Some("std::nullptr_t".to_string()),
            b'A' => {
                if !self.eat(b'6') {
                    return None;
                }
                let function = self.parse_function_type()?;
                Some(function.declare(function.convention))
            }
            b'C' => {
                let cv = self.parse_cv()?;
                let inner = self.parse_type()?;
                Some(format!("{}{}", inner, cv))
            }
            _ => None,
        }
    }

    fn parse_cv(&mut self) -> Option<&'static str> {
        Some(match self.advance()? {
            b'A' => "",
            b'B' => " const",
            b'C' => " volatile",
            b'D' => " const volatile",
            _ => return None,
        })
    }

    fn parse_indirection(&mut self, symbol: &str, self_cv: &str) -> Option<String> {
        while matches!(self.peek(), Some(b'E') | Some(b'I') | Some(b'F')) {
            self.advance();
        }
        if self.eat(b'6') {
            let function = self.parse_function_type()?;
            return Some(function.declare(&format!("({}{}{})", function.convention, symbol, self_cv)));
        }
        let cv = self.parse_cv()?;
        let pointee = self.parse_type()?;
        Some(format!("{}{} {}{}", pointee, cv, symbol, self_cv))
    }

    fn parse_qualified_name(&mut self) -> Option<String> {
        let mut parts = Vec::new();
        loop {
            match self.peek()? {
                b'@' => {
                    self.advance();
                    break;
                }
                _ => parts.push(self.parse_name_fragment()?),
            }
        }
        if parts.is_empty() {
            return None;
        }
        parts.reverse();
        Some(parts.join("::"))
    }

    fn parse_name_fragment(&mut self) -> Option<String> {
        match self.peek()? {
            c @ b'0'..=b'9' => {
                self.advance();
                self.names.get((c - b'0') as usize).cloned()
            }
            b'?' if self.at_local_scope() => self.parse_local_scope(),
            b'?' => {
                self.advance();
                match self.advance()? {
                    b'$' => self.parse_template_name(),
                    b'A' => {
                        self.parse_simple_name()?;
                        let name = "`anonymous namespace'".to_string();
                        self.remember_name(&name);
                        Some(name)
                    }
                    _ => None,
                }
            }
            _ => {
                let name = self.parse_simple_name()?;
                self.remember_name(&name);
                Some(name)
            }
        }
    }

    /// `?` + encoded number + `?`, opening the scope of a function-local type.
    fn at_local_scope(&self) -> bool {
        let rest = &self.input[self.pos..];
        if rest.first() != Some(&b'?') {
            return false;
        }
        match rest.get(1) {
            Some(b'0'..=b'9') => rest.get(2) == Some(&b'?'),
            Some(b'A'..=b'P') => {
                let digits = rest[1..].iter().take_while(|c| (b'A'..=b'P').contains(*c)).count();
                rest.get(1 + digits) == Some(&b'@') && rest.get(2 + digits) == Some(&b'?')
            }
            _ => false,
        }
    }

    fn parse_local_scope(&mut self) -> Option<String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return None;
        }
        self.advance();
        let result = match self.parse_encoded_number() {
            Some(index) if self.eat(b'?') => {
                let outer_names = std::mem::take(&mut self.names);
                let outer_types = std::mem::take(&mut self.types);
                let function = self.parse_function_symbol();
                self.names = outer_names;
                self.types = outer_types;
                function.map(|function| format!("`{}'::`{}'", function, index))
            }
            _ => None,
        };
        self.depth -= 1;
        result
    }

    /// A complete `?name@@...Z` function symbol, as enclosing scope of a local type.
    fn parse_function_symbol(&mut self) -> Option<String> {
        if !self.eat(b'?') {
            return None;
        }
        let name = if self.input[self.pos..].starts_with(b"?0") || self.input[self.pos..].starts_with(b"?1") {
            self.advance();
            let destructor = self.advance()? == b'1';
            let class = self.parse_qualified_name()?;
            let short = class.rsplit("::").next().unwrap_or(&class).to_string();
            if destructor {
                format!("{}::~{}", class, short)
            } else {
                format!("{}::{}", class, short)
            }
        } else {
            self.parse_qualified_name()?
        };

        let (access, has_this) = match self.advance()? {
            b'Y' | b'Z' => ("", false),
            b'A' | b'B' => ("private: ", true),
            b'C' | b'D' => ("private: static ", false),
            b'E' | b'F' => ("private: virtual ", true),
            b'I' | b'J' => ("protected: ", true),
            b'K' | b'L' => ("protected: static ", false),
            b'M' | b'N' => ("protected: virtual ", true),
            b'Q' | b'R' => ("public: ", true),
            b'S' | b'T' => ("public: static ", false),
            b'U' | b'V' => ("public: virtual ", true),
            _ => return None,
        };
        let this_cv = if has_this {
            while matches!(self.peek(), Some(b'E') | Some(b'I') | Some(b'F')) {
                self.advance();
            }
            self.parse_cv()?
        } else {
            ""
        };
        let function = self.parse_function_type()?;
        let declarator = format!("{} {}", function.convention, name);
        Some(format!("{}{}{}", access, function.declare(&declarator), this_cv))
    }

    fn parse_calling_convention(&mut self) -> Option<&'static str> {
        Some(match self.advance()? {
            b'A' | b'B' => "__cdecl",
            b'C' | b'D' => "__pascal",
            b'E' | b'F' => "__thiscall",
            b'G' | b'H' => "__stdcall",
            b'I' | b'J' => "__fastcall",
            b'M' | b'N' => "__clrcall",
            b'O' | b'P' => "__eabi",
            b'Q' => "__vectorcall",
            _ => return None,
        })
    }

    /// Calling convention, return type, parameter list and throw specification.
    fn parse_function_type(&mut self) -> Option<FunctionType> {
        let convention = self.parse_calling_convention()?;
        let returns = if self.eat(b'@') {
            None
        } else if self.eat(b'?') {
            let cv = self.parse_cv()?;
            let ty = self.parse_type()?;
            Some(format!("{}{}", ty, cv))
        } else {
            Some(self.parse_type()?)
        };
        let params = self.parse_parameter_list()?;
        let noexcept = if self.input[self.pos..].starts_with(b"_E") {
            self.pos += 2;
            true
        } else if self.eat(b'Z') {
            false
        } else {
            return None;
        };
        Some(FunctionType { convention, returns, params, noexcept })
    }

    fn parse_parameter_list(&mut self) -> Option<String> {
        if self.eat(b'X') {
            return Some("void".to_string());
        }
        let mut params = Vec::new();
        loop {
            match self.peek()? {
                b'@' => {
                    self.advance();
                    break;
                }
                b'Z' => {
                    self.advance();
                    params.push("...".to_string());
                    break;
                }
                _ => {
                    let start = self.pos;
                    let param = self.parse_type()?;
                    if self.pos - start > 1 && self.types.len() < MAX_BACKREFS {
                        self.types.push(param.clone());
                    }
                    params.push(param);
                }
            }
        }
        if params.is_empty() {
            return None;
        }
        Some(params.join(","))
    }

    fn parse_simple_name(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'@' {
                let name = std::str::from_utf8(&self.input[start..self.pos]).ok()?;
                self.advance();
                return Some(name.to_string());
            }
            if !(c.is_ascii_graphic()) {
                return None;
            }
            self.advance();
        }
        None
    }

    fn remember_name(&mut self, name: &str) {
        if self.names.len() < MAX_BACKREFS && !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    fn parse_template_name(&mut self) -> Option<String> {
        let outer_names = std::mem::take(&mut self.names);
        let outer_types = std::mem::take(&mut self.types);
        let result = self.parse_template_body();
        self.names = outer_names;
        self.types = outer_types;

        let name = result?;
        self.remember_name(&name);
        Some(name)
    }

    fn parse_template_body(&mut self) -> Option<String> {
        let base = self.parse_simple_name()?;
        if base.is_empty() {
            return None;
        }
        self.remember_name(&base);

        let mut args = Vec::new();
        loop {
            match self.peek()? {
                b'@' => {
                    self.advance();
                    break;
                }
                b'$' if self.input[self.pos..].starts_with(b"$0") => {
                    self.pos += 2;
                    args.push(self.parse_encoded_number()?.to_string());
                }
                b'$' if self.input[self.pos..].starts_with(b"$$V")
                    || self.input[self.pos..].starts_with(b"$$Z") =>
                {
                    self.pos += 3;
                }
                _ => {
                    let start = self.pos;
                    let arg = self.parse_type()?;
                    if self.pos - start > 1 && self.types.len() < MAX_BACKREFS {
                        self.types.push(arg.clone());
                    }
                    args.push(arg);
                }
            }
        }

        let joined = args.join(",");
        let close = if joined.ends_with('>') { " >" } else { ">" };
        Some(format!("{}<{}{}", base, joined, close))
    }

    /// Digits `0`-`9` encode 1-10; otherwise hex digits `A`-`P`, most
    /// significant first, terminated by `@`. A leading `?` negates.
    fn parse_encoded_number(&mut self) -> Option<i64> {
        let negative = self.eat(b'?');
        let value = match self.peek()? {
            c @ b'0'..=b'9' => {
                self.advance();
                (c - b'0') as i64 + 1
            }
            _ => {
                let mut value: i64 = 0;
                loop {
                    match self.advance()? {
                        b'@' => break,
                        c @ b'A'..=b'P' => {
                            value = value.checked_mul(16)?.checked_add((c - b'A') as i64)?;
                        }
                        _ => return None,
                    }
                }
                value
            }
        };
        Some(if negative { -value } else { value })
    }
}
