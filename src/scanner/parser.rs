//! Reference extraction from PHP sources.
//!
//! The parser walks the token stream once and produces a flat syntax tree
//! holding exactly what name resolution needs: namespace declarations,
//! import (`use`) declarations, and every class, function, or constant
//! reference in the order it appears. Bracket nesting is checked along the
//! way so truncated or mangled files fail instead of yielding a partial
//! tree.

use std::fmt;

use super::lexer::{tokenize, LexError, Token, TokenKind};

/// The closed set of things a name can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Class,
    Function,
    Constant,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Class => write!(f, "class"),
            ReferenceKind::Function => write!(f, "function"),
            ReferenceKind::Constant => write!(f, "constant"),
        }
    }
}

/// One imported name: `use Vendor\Logger\Writer as LogWriter;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub kind: ReferenceKind,
    /// Fully qualified target, without a leading separator
    pub name: String,
    pub alias: String,
}

/// A name as written in source, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub name: String,
    pub line: usize,
}

/// A node of the syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Start of a namespace scope; `None` is the global namespace
    Namespace { name: Option<String>, line: usize },
    Use(Vec<Import>),
    Reference(Reference),
}

/// Parsed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxTree {
    pub nodes: Vec<Node>,
}

impl SyntaxTree {
    /// References in source order.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Reference(r) => Some(r),
            _ => None,
        })
    }
}

/// A syntax error with its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for SyntaxError {}

impl From<LexError> for SyntaxError {
    fn from(e: LexError) -> Self {
        SyntaxError {
            line: e.line,
            message: e.message,
        }
    }
}

/// Turns source text into a [`SyntaxTree`].
///
/// The scanner clones one parser per worker thread, so implementations may
/// keep per-instance state.
pub trait SourceParser: Clone + Send {
    fn parse(&mut self, source: &str) -> Result<SyntaxTree, SyntaxError>;
}

/// Parser for PHP source files.
#[derive(Debug, Clone, Default)]
pub struct PhpParser;

impl PhpParser {
    pub fn new() -> Self {
        PhpParser
    }
}

impl SourceParser for PhpParser {
    fn parse(&mut self, source: &str) -> Result<SyntaxTree, SyntaxError> {
        let tokens = tokenize(source)?;
        Parser::new(tokens).run()
    }
}

/// Reserved words. Never references on their own.
const KEYWORDS: &[&str] = &[
    "abstract", "and", "as", "break", "case", "catch", "class", "clone", "const", "continue",
    "declare", "default", "die", "do", "echo", "else", "elseif", "empty", "enddeclare", "endfor",
    "endforeach", "endif", "endswitch", "endwhile", "eval", "exit", "extends", "final",
    "finally", "fn", "for", "foreach", "from", "function", "global", "goto", "if", "implements",
    "include", "include_once", "instanceof", "insteadof", "interface", "isset", "list", "match",
    "namespace", "new", "or", "print", "private", "protected", "public", "readonly", "require",
    "require_once", "return", "switch", "throw", "trait", "try", "unset", "use", "var", "while",
    "xor", "yield",
];

/// Class names that resolve relative to the enclosing class.
const SPECIAL_CLASS_NAMES: &[&str] = &["self", "static", "parent"];

/// Type keywords that are not class names, plus the cast-only spellings.
const BUILTIN_TYPES: &[&str] = &[
    "array", "binary", "bool", "boolean", "callable", "double", "false", "float", "int",
    "integer", "iterable", "mixed", "never", "null", "object", "real", "string", "true", "void",
];

fn is_reserved(lower: &str) -> bool {
    KEYWORDS.contains(&lower) || SPECIAL_CLASS_NAMES.contains(&lower) || BUILTIN_TYPES.contains(&lower)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BraceKind {
    Namespace,
    ClassBody,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Brace(BraceKind),
    Paren,
    Bracket,
    Attribute,
}

impl Open {
    fn text(&self) -> &'static str {
        match self {
            Open::Brace(_) => "{",
            Open::Paren => "(",
            Open::Bracket => "[",
            Open::Attribute => "#[",
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    nodes: Vec<Node>,
    stack: Vec<(Open, usize)>,
    handled: Vec<bool>,
    /// Names up to the next `{` or `;` are class names
    /// (`extends`, `implements`, `insteadof`, trait `use`).
    class_list: bool,
    pending_class_body: bool,
    pending_namespace_body: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token<'a>>) -> Self {
        let handled = vec![false; tokens.len()];
        Parser {
            tokens,
            pos: 0,
            nodes: Vec::new(),
            stack: Vec::new(),
            handled,
            class_list: false,
            pending_class_body: false,
            pending_namespace_body: false,
        }
    }

    fn run(mut self) -> Result<SyntaxTree, SyntaxError> {
        while self.pos < self.tokens.len() {
            let tok = self.tokens[self.pos];
            match tok.kind {
                TokenKind::LBrace => {
                    let kind = if std::mem::take(&mut self.pending_namespace_body) {
                        BraceKind::Namespace
                    } else if std::mem::take(&mut self.pending_class_body) {
                        BraceKind::ClassBody
                    } else {
                        BraceKind::Other
                    };
                    self.class_list = false;
                    self.stack.push((Open::Brace(kind), tok.line));
                }
                TokenKind::LParen => self.stack.push((Open::Paren, tok.line)),
                TokenKind::LBracket => self.stack.push((Open::Bracket, tok.line)),
                TokenKind::AttributeOpen => self.stack.push((Open::Attribute, tok.line)),
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => self.close(tok)?,
                TokenKind::Semicolon | TokenKind::CloseTag => self.class_list = false,
                TokenKind::Name if !self.handled[self.pos] => self.name()?,
                _ => {}
            }
            self.pos += 1;
        }

        if let Some((open, line)) = self.stack.last() {
            return Err(SyntaxError {
                line: *line,
                message: format!("unclosed `{}`", open.text()),
            });
        }

        Ok(SyntaxTree { nodes: self.nodes })
    }

    fn close(&mut self, tok: Token<'a>) -> Result<(), SyntaxError> {
        let Some((open, line)) = self.stack.pop() else {
            return Err(SyntaxError {
                line: tok.line,
                message: format!("unexpected `{}`", tok.text),
            });
        };

        let matches = matches!(
            (open, tok.kind),
            (Open::Brace(_), TokenKind::RBrace)
                | (Open::Paren, TokenKind::RParen)
                | (Open::Bracket | Open::Attribute, TokenKind::RBracket)
        );
        if !matches {
            return Err(SyntaxError {
                line: tok.line,
                message: format!(
                    "unexpected `{}`, `{}` from line {} is still open",
                    tok.text,
                    open.text(),
                    line
                ),
            });
        }
        Ok(())
    }

    fn token(&self, i: usize) -> Option<Token<'a>> {
        self.tokens.get(i).copied()
    }

    fn kind_at(&self, i: usize) -> Option<TokenKind> {
        self.tokens.get(i).map(|t| t.kind)
    }

    fn error_at(&self, i: usize, message: impl Into<String>) -> SyntaxError {
        let line = self
            .token(i)
            .or_else(|| self.tokens.last().copied())
            .map_or(1, |t| t.line);
        SyntaxError {
            line,
            message: message.into(),
        }
    }

    fn name(&mut self) -> Result<(), SyntaxError> {
        let i = self.pos;
        let tok = self.tokens[i];

        // Member access: `$x->name`, `Foo::name`
        if i > 0 && matches!(self.kind_at(i - 1), Some(TokenKind::Arrow | TokenKind::DoubleColon)) {
            return Ok(());
        }

        let lower = tok.text.to_ascii_lowercase();

        // `enum` is only a keyword in front of a declaration
        if lower == "enum" && self.kind_at(i + 1) == Some(TokenKind::Name) {
            self.handled[i + 1] = true;
            self.pending_class_body = true;
            return Ok(());
        }

        if is_reserved(&lower) {
            return self.keyword(&lower);
        }

        self.reference(i);
        Ok(())
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), SyntaxError> {
        let i = self.pos;
        match keyword {
            "namespace" => self.namespace_declaration()?,
            "use" => self.use_declaration()?,

            "class" | "interface" | "trait" => {
                if self.kind_at(i + 1) == Some(TokenKind::Name) {
                    self.handled[i + 1] = true;
                }
                self.pending_class_body = true;
            }

            "extends" | "implements" | "insteadof" => self.class_list = true,

            "function" | "fn" => self.function_signature(),

            "const" => {
                if self.kind_at(i + 1) == Some(TokenKind::Name)
                    && self.token(i + 2).is_some_and(|t| t.text == "=")
                {
                    self.handled[i + 1] = true;
                }
            }

            "goto" => {
                if self.kind_at(i + 1) == Some(TokenKind::Name) {
                    self.handled[i + 1] = true;
                }
            }

            "new" => {
                if let Some(next) = self.token(i + 1).filter(|t| t.is(TokenKind::Name)) {
                    if next.is_keyword("class") {
                        self.pending_class_body = true;
                    } else {
                        self.class_name(i + 1);
                    }
                    self.handled[i + 1] = true;
                }
            }

            "instanceof" => {
                if self.kind_at(i + 1) == Some(TokenKind::Name) {
                    self.class_name(i + 1);
                }
            }

            "catch" => {
                if self.kind_at(i + 1) == Some(TokenKind::LParen) {
                    let mut j = i + 2;
                    while let Some(t) = self.token(j) {
                        match t.kind {
                            TokenKind::Name => self.class_name(j),
                            TokenKind::Pipe => {}
                            _ => break,
                        }
                        j += 1;
                    }
                }
            }

            _ => {}
        }
        Ok(())
    }

    /// Record a class name in a position that can only hold one, unless it
    /// is a special or builtin name.
    fn class_name(&mut self, i: usize) {
        self.handled[i] = true;
        let text = self.tokens[i].text;
        if text.contains('\\') || !is_reserved(&text.to_ascii_lowercase()) {
            self.record(ReferenceKind::Class, i);
        }
    }

    fn record(&mut self, kind: ReferenceKind, i: usize) {
        let tok = self.tokens[i];
        self.handled[i] = true;
        self.nodes.push(Node::Reference(Reference {
            kind,
            name: tok.text.to_string(),
            line: tok.line,
        }));
    }

    fn reference(&mut self, i: usize) {
        let prev = i.checked_sub(1).and_then(|p| self.kind_at(p));
        let next = self.kind_at(i + 1);

        let in_attribute = prev == Some(TokenKind::AttributeOpen)
            || (prev == Some(TokenKind::Comma)
                && matches!(self.stack.last(), Some((Open::Attribute, _))));

        let kind = if self.class_list || in_attribute || next == Some(TokenKind::DoubleColon) {
            ReferenceKind::Class
        } else if next == Some(TokenKind::LParen) {
            ReferenceKind::Function
        } else if self.is_type_position(i) {
            ReferenceKind::Class
        } else {
            ReferenceKind::Constant
        };

        self.record(kind, i);
    }

    /// A parameter or property type: a name in a parameter list or class
    /// body, followed by a union, intersection or DNF type run that ends in
    /// a variable, `&$var` or `...`.
    fn is_type_position(&self, i: usize) -> bool {
        if !matches!(
            self.stack.last(),
            Some((Open::Paren | Open::Brace(BraceKind::ClassBody), _))
        ) {
            return false;
        }

        let prev = i.checked_sub(1).and_then(|p| self.kind_at(p));
        // Inside an intersection group, as in `(A&B)|null`
        let mut in_group = prev == Some(TokenKind::Amp)
            || (prev == Some(TokenKind::LParen) && self.kind_at(i + 1) == Some(TokenKind::Amp));
        let mut depth = 0usize;

        let mut j = i + 1;
        loop {
            match self.kind_at(j) {
                Some(TokenKind::Variable | TokenKind::Ellipsis) => return true,
                Some(separator @ (TokenKind::Pipe | TokenKind::Amp)) => {
                    j += 1;
                    match self.kind_at(j) {
                        Some(TokenKind::Variable | TokenKind::Ellipsis)
                            if separator == TokenKind::Amp =>
                        {
                            return true
                        }
                        Some(TokenKind::Name) => j += 1,
                        Some(TokenKind::LParen) if self.kind_at(j + 1) == Some(TokenKind::Name) => {
                            depth += 1;
                            j += 2;
                        }
                        _ => return false,
                    }
                }
                Some(TokenKind::RParen) if depth > 0 => {
                    depth -= 1;
                    j += 1;
                }
                Some(TokenKind::RParen) if in_group => {
                    in_group = false;
                    j += 1;
                }
                _ => return false,
            }
        }
    }

    /// `function name(...) use (...): Type`: skip the declared name and
    /// record the return type.
    fn function_signature(&mut self) {
        let mut j = self.pos + 1;
        if self.kind_at(j) == Some(TokenKind::Amp) {
            j += 1;
        }
        if self.kind_at(j) == Some(TokenKind::Name) {
            self.handled[j] = true;
            j += 1;
        }
        if self.kind_at(j) != Some(TokenKind::LParen) {
            return;
        }
        let Some(mut j) = self.matching_paren(j) else {
            return;
        };

        if self.token(j + 1).is_some_and(|t| t.is_keyword("use"))
            && self.kind_at(j + 2) == Some(TokenKind::LParen)
        {
            match self.matching_paren(j + 2) {
                Some(close) => j = close,
                None => return,
            }
        }

        if self.kind_at(j + 1) != Some(TokenKind::Colon) {
            return;
        }

        let mut k = j + 2;
        while let Some(kind) = self.kind_at(k) {
            match kind {
                TokenKind::Name => self.class_name(k),
                TokenKind::Question
                | TokenKind::Pipe
                | TokenKind::Amp
                | TokenKind::LParen
                | TokenKind::RParen => {}
                _ => break,
            }
            k += 1;
        }
    }

    fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (offset, tok) in self.tokens[open..].iter().enumerate() {
            match tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(open + offset);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// `namespace Name;`, `namespace Name {`, or `namespace {`.
    fn namespace_declaration(&mut self) -> Result<(), SyntaxError> {
        let i = self.pos;
        let line = self.tokens[i].line;

        match self.kind_at(i + 1) {
            Some(TokenKind::Name) => {
                let name = self.tokens[i + 1].text.trim_start_matches('\\').to_string();
                match self.kind_at(i + 2) {
                    Some(TokenKind::Semicolon | TokenKind::CloseTag) => {
                        self.pos = i + 2;
                    }
                    Some(TokenKind::LBrace) => {
                        self.pending_namespace_body = true;
                        self.pos = i + 1;
                    }
                    _ => return Err(self.error_at(i + 2, "malformed namespace declaration")),
                }
                self.nodes.push(Node::Namespace {
                    name: Some(name),
                    line,
                });
            }
            Some(TokenKind::LBrace) => {
                self.pending_namespace_body = true;
                self.nodes.push(Node::Namespace { name: None, line });
            }
            _ => return Err(self.error_at(i + 1, "malformed namespace declaration")),
        }
        Ok(())
    }

    fn use_declaration(&mut self) -> Result<(), SyntaxError> {
        let i = self.pos;

        // Closure capture list: `function () use ($x)`
        if self.kind_at(i + 1) == Some(TokenKind::LParen) {
            return Ok(());
        }

        match self.stack.last() {
            Some((Open::Brace(BraceKind::ClassBody), _)) => {
                self.class_list = true;
                Ok(())
            }
            None | Some((Open::Brace(BraceKind::Namespace), _)) => self.import(),
            _ => Ok(()),
        }
    }

    fn import_kind(&self, j: usize) -> Option<ReferenceKind> {
        let tok = self.token(j)?;
        if tok.is_keyword("function") {
            Some(ReferenceKind::Function)
        } else if tok.is_keyword("const") {
            Some(ReferenceKind::Constant)
        } else {
            None
        }
    }

    fn expect_name(&self, j: usize) -> Result<&'a str, SyntaxError> {
        match self.token(j) {
            Some(t) if t.is(TokenKind::Name) => Ok(t.text.trim_start_matches('\\')),
            _ => Err(self.error_at(j, "malformed use declaration")),
        }
    }

    /// `as Alias`, if present at `j`.
    fn alias(&self, j: &mut usize) -> Result<Option<&'a str>, SyntaxError> {
        if !self.token(*j).is_some_and(|t| t.is_keyword("as")) {
            return Ok(None);
        }
        let alias = self.expect_name(*j + 1)?;
        *j += 2;
        Ok(Some(alias))
    }

    fn import(&mut self) -> Result<(), SyntaxError> {
        let mut j = self.pos + 1;
        let mut imports = Vec::new();

        let kind = match self.import_kind(j) {
            Some(kind) => {
                j += 1;
                kind
            }
            None => ReferenceKind::Class,
        };

        loop {
            let name = self.expect_name(j)?;
            j += 1;

            if self.kind_at(j) == Some(TokenKind::Backslash)
                && self.kind_at(j + 1) == Some(TokenKind::LBrace)
            {
                j += 2;
                loop {
                    if self.kind_at(j) == Some(TokenKind::RBrace) {
                        j += 1;
                        break;
                    }

                    let item_kind = match self.import_kind(j) {
                        Some(k) if kind == ReferenceKind::Class => {
                            j += 1;
                            k
                        }
                        _ => kind,
                    };
                    let member = self.expect_name(j)?;
                    j += 1;

                    let full = format!("{}\\{}", name, member);
                    let alias = match self.alias(&mut j)? {
                        Some(alias) => alias.to_string(),
                        None => last_segment(&full).to_string(),
                    };
                    imports.push(Import {
                        kind: item_kind,
                        name: full,
                        alias,
                    });

                    match self.kind_at(j) {
                        Some(TokenKind::Comma) => j += 1,
                        Some(TokenKind::RBrace) => {
                            j += 1;
                            break;
                        }
                        _ => return Err(self.error_at(j, "malformed group use declaration")),
                    }
                }
            } else {
                let alias = match self.alias(&mut j)? {
                    Some(alias) => alias.to_string(),
                    None => last_segment(name).to_string(),
                };
                imports.push(Import {
                    kind,
                    name: name.to_string(),
                    alias,
                });
            }

            if self.kind_at(j) == Some(TokenKind::Comma) {
                j += 1;
                continue;
            }
            break;
        }

        if !matches!(
            self.kind_at(j),
            Some(TokenKind::Semicolon | TokenKind::CloseTag)
        ) {
            return Err(self.error_at(j, "expected `;` after use declaration"));
        }

        self.nodes.push(Node::Use(imports));
        self.pos = j;
        Ok(())
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> SyntaxTree {
        PhpParser::new().parse(src).unwrap()
    }

    fn refs(src: &str) -> Vec<(ReferenceKind, String)> {
        parse(src)
            .references()
            .map(|r| (r.kind, r.name.clone()))
            .collect()
    }

    fn classes(src: &str) -> Vec<String> {
        refs(src)
            .into_iter()
            .filter(|(k, _)| *k == ReferenceKind::Class)
            .map(|(_, n)| n)
            .collect()
    }

    #[test]
    fn test_namespace_and_imports() {
        let tree = parse(
            "<?php\nnamespace Acme\\App;\n\nuse Vendor\\Logger\\Writer;\nuse function Vendor\\Logger\\log as write_log;\nuse const Vendor\\Logger\\LEVEL, \\Other\\Thing as T;\n",
        );

        assert_eq!(
            tree.nodes,
            [
                Node::Namespace {
                    name: Some("Acme\\App".to_string()),
                    line: 2,
                },
                Node::Use(vec![Import {
                    kind: ReferenceKind::Class,
                    name: "Vendor\\Logger\\Writer".to_string(),
                    alias: "Writer".to_string(),
                }]),
                Node::Use(vec![Import {
                    kind: ReferenceKind::Function,
                    name: "Vendor\\Logger\\log".to_string(),
                    alias: "write_log".to_string(),
                }]),
                Node::Use(vec![
                    Import {
                        kind: ReferenceKind::Constant,
                        name: "Vendor\\Logger\\LEVEL".to_string(),
                        alias: "LEVEL".to_string(),
                    },
                    Import {
                        kind: ReferenceKind::Constant,
                        name: "Other\\Thing".to_string(),
                        alias: "T".to_string(),
                    },
                ]),
            ]
        );
    }

    #[test]
    fn test_group_use() {
        let tree = parse("<?php use Vendor\\Logger\\{Writer, Level as L, function log,};");
        let Node::Use(imports) = &tree.nodes[0] else {
            panic!("expected a use node");
        };

        let summary: Vec<_> = imports
            .iter()
            .map(|i| (i.kind, i.name.as_str(), i.alias.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                (ReferenceKind::Class, "Vendor\\Logger\\Writer", "Writer"),
                (ReferenceKind::Class, "Vendor\\Logger\\Level", "L"),
                (ReferenceKind::Function, "Vendor\\Logger\\log", "log"),
            ]
        );
    }

    #[test]
    fn test_class_positions() {
        let src = r#"<?php
#[Route('/x'), Cached]
final class Service extends Base implements Countable, \Stringable
{
    use LoggerAware, Timestamps { Timestamps::touch insteadof LoggerAware; }

    public function __construct(private ?Writer $writer, Level|Severity ...$levels) {}

    public function handle(Request $r): Response|false
    {
        try {
            $x = new Handler();
            if ($r instanceof Special) {}
            return Factory::create(static::class, self::X);
        } catch (IoError | \RuntimeException) {
        }
    }
}
"#;
        assert_eq!(
            classes(src),
            [
                "Route",
                "Cached",
                "Base",
                "Countable",
                "\\Stringable",
                "LoggerAware",
                "Timestamps",
                "Timestamps",
                "LoggerAware",
                "Writer",
                "Level",
                "Severity",
                "Response",
                "Request",
                "Handler",
                "Special",
                "Factory",
                "IoError",
                "\\RuntimeException",
            ]
        );
    }

    #[test]
    fn test_function_and_constant_references() {
        let src = "<?php\nnamespace A;\n$x = helper(1) + \\strlen('a') + Sub\\fn_call();\necho \\Vendor\\LEVEL, PHP_EOL;\n$o->method(); Foo::bar(); function local() {}\n";
        let found = refs(src);
        assert_eq!(
            found,
            [
                (ReferenceKind::Function, "helper".to_string()),
                (ReferenceKind::Function, "\\strlen".to_string()),
                (ReferenceKind::Function, "Sub\\fn_call".to_string()),
                (ReferenceKind::Constant, "\\Vendor\\LEVEL".to_string()),
                (ReferenceKind::Constant, "PHP_EOL".to_string()),
                (ReferenceKind::Class, "Foo".to_string()),
            ]
        );
    }

    #[test]
    fn test_closures_and_declarations_are_not_references() {
        let src = "<?php\nconst LIMIT = 10;\nenum Suit: string { case Hearts = 'H'; }\ninterface Shape {}\ntrait T {}\n$f = function () use ($x): ?Result { return $x; };\n$g = fn(int $a): int => $a;\n";
        assert_eq!(
            refs(src),
            [
                (ReferenceKind::Constant, "Hearts".to_string()),
                (ReferenceKind::Class, "Result".to_string()),
            ]
        );
    }

    #[test]
    fn test_dnf_and_by_reference_types() {
        let src = "<?php\nfunction f((A&B)|null $x, C|(D&E) $y, F &$z, G&H ...$rest) {}\n";
        assert_eq!(classes(src), ["A", "B", "C", "D", "E", "F", "G", "H"]);
    }

    #[test]
    fn test_operands_are_not_types() {
        let src = "<?php\nnamespace App;\nfunction f($x) {\n    if (DEBUG and $x) {}\n    $a = (integer) $x + (double) $x + (real) $x + (boolean) $x;\n    $b = (LIMIT) | $x;\n}\n";
        assert_eq!(
            refs(src),
            [
                (ReferenceKind::Constant, "DEBUG".to_string()),
                (ReferenceKind::Constant, "LIMIT".to_string()),
            ]
        );
    }

    #[test]
    fn test_typed_properties() {
        let src = "<?php class A { public Logger $log; private static ?Cache $cache = null; }";
        assert_eq!(classes(src), ["Logger", "Cache"]);
    }

    #[test]
    fn test_relative_namespace_name() {
        assert_eq!(
            refs("<?php namespace A; namespace\\sub\\run();"),
            [(ReferenceKind::Function, "namespace\\sub\\run".to_string())]
        );
    }

    #[test]
    fn test_braced_namespaces() {
        let tree = parse("<?php namespace A { new X; } namespace { new Y; }");
        let namespaces: Vec<_> = tree
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Namespace { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(namespaces, [Some("A".to_string()), None]);
        assert_eq!(classes("<?php namespace A { new X; } namespace { new Y; }"), ["X", "Y"]);
    }

    #[test]
    fn test_member_names_are_skipped() {
        assert!(refs("<?php $a->list(); $b?->Foo; $c::$d; $e->class;").is_empty());
    }

    #[test]
    fn test_unbalanced_brackets_fail() {
        let err = PhpParser::new()
            .parse("<?php\nfunction f() {\n  if (true) {\n}\n")
            .unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unclosed `{`"));

        let err = PhpParser::new().parse("<?php\nfoo(];").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unexpected `]`"));
    }

    #[test]
    fn test_malformed_statements_fail() {
        let err = PhpParser::new().parse("<?php use ;").unwrap_err();
        assert!(err.message.contains("malformed use declaration"));

        let err = PhpParser::new().parse("<?php use A\\B C;").unwrap_err();
        assert!(err.message.contains("expected `;`"));

        let err = PhpParser::new().parse("<?php namespace ;").unwrap_err();
        assert!(err.message.contains("malformed namespace"));
    }

    #[test]
    fn test_lex_errors_propagate() {
        let err = PhpParser::new().parse("<?php\n\n'open").unwrap_err();
        assert_eq!(err.line, 3);
    }
}
