//! Declaration tree consumed by the analyzer.
//!
//! Trees are produced by an external builder and arrive as JSON. Every node
//! carries a [`NodeId`] that is unique within its [`SourceFile`]; ids are not
//! part of the interchange format and are assigned by [`SourceFile::new`] in
//! pre-order, starting at 1.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(skip)]
    labels: HashMap<NodeId, String>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        let mut file = Self {
            name: name.into(),
            declarations,
            labels: HashMap::new(),
        };
        file.assign_ids();
        file
    }

    pub fn from_json(name: impl Into<String>, source: &str) -> Result<Self, serde_json::Error> {
        let mut file: SourceFile = serde_json::from_str(source)?;
        file.name = name.into();
        file.assign_ids();
        Ok(file)
    }

    pub fn from_value(
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let mut file: SourceFile = serde_json::from_value(value)?;
        file.name = name.into();
        file.assign_ids();
        Ok(file)
    }

    /// Human-readable description of a node, e.g. ``function `main` ``.
    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.labels.get(&node).map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    fn assign_ids(&mut self) {
        let mut numbering = NodeNumbering::default();
        for declaration in &mut self.declarations {
            numbering.declaration(declaration);
        }
        self.labels = numbering.labels;
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Namespace(NamespaceDecl),
    Class(ClassDecl),
    Typedef(TypedefDecl),
    Extension(ExtensionDecl),
    Function(FunctionDecl),
    Property(PropertyDecl),
    Constructor(ConstructorDecl),
    ClassObject(ClassObjectDecl),
}

impl Declaration {
    pub fn id(&self) -> NodeId {
        match self {
            Declaration::Namespace(d) => d.id,
            Declaration::Class(d) => d.id,
            Declaration::Typedef(d) => d.id,
            Declaration::Extension(d) => d.id,
            Declaration::Function(d) => d.id,
            Declaration::Property(d) => d.id,
            Declaration::Constructor(d) => d.id,
            Declaration::ClassObject(d) => d.id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamespaceDecl {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub imports: Vec<ImportDirective>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportDirective {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub imported: Option<Expression>,
    #[serde(default)]
    pub all_under: bool,
    #[serde(default)]
    pub absolute_in_root: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassDecl {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    /// `None` when the class has no primary constructor parameter list at
    /// all; `Some(vec![])` for an explicit empty list.
    #[serde(default)]
    pub primary_constructor: Option<Vec<Parameter>>,
    #[serde(default)]
    pub delegation_specifiers: Vec<DelegationSpecifier>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassObjectDecl {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypedefDecl {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtensionDecl {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDecl {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub body: Option<Expression>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyDecl {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub type_ref: Option<TypeRef>,
    #[serde(default)]
    pub initializer: Option<Expression>,
    #[serde(default)]
    pub getter: Option<Accessor>,
    #[serde(default)]
    pub setter: Option<Accessor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Accessor {
    #[serde(skip)]
    pub id: NodeId,
    /// Setter parameter; ignored on getters.
    #[serde(default)]
    pub parameter: Option<Parameter>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub body: Option<Expression>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConstructorDecl {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub initializers: Vec<DelegationSpecifier>,
    #[serde(default)]
    pub body: Option<Expression>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Parameter {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub type_ref: Option<TypeRef>,
    #[serde(default)]
    pub mutable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TypeRef {
    #[serde(skip)]
    pub id: NodeId,
    /// Possibly dotted: `ns.inner.Class`.
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelegationSpecifier {
    /// `: Trait by delegate`
    ByExpression {
        #[serde(skip)]
        id: NodeId,
        type_ref: TypeRef,
        #[serde(default)]
        delegate: Option<Expression>,
    },
    /// `: Base(args)`, or `super(args)` in a constructor initializer list.
    SuperCall {
        #[serde(skip)]
        id: NodeId,
        #[serde(default)]
        type_ref: Option<TypeRef>,
        #[serde(default)]
        arguments: Vec<Expression>,
    },
    /// `: Base` with no call.
    SuperClass {
        #[serde(skip)]
        id: NodeId,
        type_ref: TypeRef,
    },
    /// `this(args)`
    ThisCall {
        #[serde(skip)]
        id: NodeId,
        #[serde(default)]
        arguments: Vec<Expression>,
    },
}

impl DelegationSpecifier {
    pub fn id(&self) -> NodeId {
        match self {
            DelegationSpecifier::ByExpression { id, .. }
            | DelegationSpecifier::SuperCall { id, .. }
            | DelegationSpecifier::SuperClass { id, .. }
            | DelegationSpecifier::ThisCall { id, .. } => *id,
        }
    }

    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            DelegationSpecifier::ByExpression { type_ref, .. }
            | DelegationSpecifier::SuperClass { type_ref, .. } => Some(type_ref),
            DelegationSpecifier::SuperCall { type_ref, .. } => type_ref.as_ref(),
            DelegationSpecifier::ThisCall { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Expression {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Double(f64),
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Plus,
    Minus,
    Times,
    Div,
    Rem,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Times => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpressionKind {
    Constant {
        value: Literal,
    },
    /// A simple name; `$name` denotes the backing field of property `name`.
    Name {
        name: String,
    },
    Dot {
        receiver: Box<Expression>,
        name: String,
    },
    Block {
        #[serde(default)]
        statements: Vec<Expression>,
    },
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        #[serde(default)]
        else_branch: Option<Box<Expression>>,
    },
    While {
        condition: Box<Expression>,
        body: Box<Expression>,
    },
    DoWhile {
        body: Box<Expression>,
        condition: Box<Expression>,
    },
    Break,
    Continue,
    Return {
        #[serde(default)]
        value: Option<Box<Expression>>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Assign {
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Call {
        callee: String,
        #[serde(default)]
        arguments: Vec<Expression>,
    },
    LocalVariable {
        name: String,
        #[serde(default)]
        mutable: bool,
        #[serde(default)]
        type_ref: Option<TypeRef>,
        #[serde(default)]
        initializer: Option<Box<Expression>>,
    },
    Lambda {
        #[serde(default)]
        parameters: Vec<Parameter>,
        body: Box<Expression>,
    },
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self {
            id: NodeId::default(),
            kind,
        }
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExpressionKind::Constant {
            value: Literal::Int(value),
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExpressionKind::Constant {
            value: Literal::String(value.into()),
        })
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExpressionKind::Constant {
            value: Literal::Bool(value),
        })
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(ExpressionKind::Name { name: name.into() })
    }

    pub fn block(statements: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::Block { statements })
    }

    pub fn ret(value: Option<Expression>) -> Self {
        Self::new(ExpressionKind::Return {
            value: value.map(Box::new),
        })
    }

    pub fn call(callee: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::Call {
            callee: callee.into(),
            arguments,
        })
    }

    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::new(ExpressionKind::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Direct sub-expressions in evaluation order.
    pub fn children(&self) -> Vec<&Expression> {
        match &self.kind {
            ExpressionKind::Constant { .. }
            | ExpressionKind::Name { .. }
            | ExpressionKind::Break
            | ExpressionKind::Continue => Vec::new(),
            ExpressionKind::Dot { receiver, .. } => vec![receiver.as_ref()],
            ExpressionKind::Block { statements } => statements.iter().collect(),
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut children = vec![condition.as_ref(), then_branch.as_ref()];
                children.extend(else_branch.as_deref());
                children
            }
            ExpressionKind::While { condition, body } => vec![condition.as_ref(), body.as_ref()],
            ExpressionKind::DoWhile { body, condition } => vec![body.as_ref(), condition.as_ref()],
            ExpressionKind::Return { value } => value.as_deref().into_iter().collect(),
            ExpressionKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExpressionKind::Assign { target, value } => vec![target.as_ref(), value.as_ref()],
            ExpressionKind::Call { arguments, .. } => arguments.iter().collect(),
            ExpressionKind::LocalVariable { initializer, .. } => {
                initializer.as_deref().into_iter().collect()
            }
            ExpressionKind::Lambda { body, .. } => vec![body.as_ref()],
        }
    }

    fn describe(&self) -> String {
        match &self.kind {
            ExpressionKind::Constant { value } => match value {
                Literal::Int(v) => format!("constant `{v}`"),
                Literal::Double(v) => format!("constant `{v}`"),
                Literal::String(v) => format!("constant \"{v}\""),
                Literal::Bool(v) => format!("constant `{v}`"),
            },
            ExpressionKind::Name { name } => format!("name `{name}`"),
            ExpressionKind::Dot { name, .. } => format!("member access `.{name}`"),
            ExpressionKind::Block { .. } => "block".to_string(),
            ExpressionKind::If { .. } => "if expression".to_string(),
            ExpressionKind::While { .. } => "while loop".to_string(),
            ExpressionKind::DoWhile { .. } => "do-while loop".to_string(),
            ExpressionKind::Break => "break".to_string(),
            ExpressionKind::Continue => "continue".to_string(),
            ExpressionKind::Return { .. } => "return".to_string(),
            ExpressionKind::Binary { operator, .. } => {
                format!("`{}` expression", operator.symbol())
            }
            ExpressionKind::Assign { .. } => "assignment".to_string(),
            ExpressionKind::Call { callee, .. } => format!("call to `{callee}`"),
            ExpressionKind::LocalVariable { name, .. } => format!("local variable `{name}`"),
            ExpressionKind::Lambda { .. } => "lambda".to_string(),
        }
    }
}

/// Reduces `elements` to those with no ancestor in the set, in pre-order.
///
/// Children of a matched node are not visited.
pub fn find_root_elements(root: &Expression, elements: &HashSet<NodeId>) -> Vec<NodeId> {
    let mut roots = Vec::new();
    let mut stack = vec![root];
    while let Some(expression) = stack.pop() {
        if elements.contains(&expression.id) {
            roots.push(expression.id);
            continue;
        }
        // Reverse so the leftmost child is visited first.
        stack.extend(expression.children().into_iter().rev());
    }
    roots
}

#[derive(Default)]
struct NodeNumbering {
    next: u32,
    labels: HashMap<NodeId, String>,
}

impl NodeNumbering {
    fn fresh(&mut self, label: String) -> NodeId {
        self.next += 1;
        let id = NodeId(self.next);
        self.labels.insert(id, label);
        id
    }

    fn declaration(&mut self, declaration: &mut Declaration) {
        match declaration {
            Declaration::Namespace(ns) => {
                ns.id = self.fresh(format!(
                    "namespace `{}`",
                    ns.name.as_deref().unwrap_or("<anonymous>")
                ));
                for import in &mut ns.imports {
                    import.id = self.fresh("import directive".to_string());
                    if let Some(imported) = &mut import.imported {
                        self.expression(imported);
                    }
                }
                self.declarations(&mut ns.declarations);
            }
            Declaration::Class(class) => {
                class.id = self.fresh(format!(
                    "class `{}`",
                    class.name.as_deref().unwrap_or("<anonymous>")
                ));
                if let Some(parameters) = &mut class.primary_constructor {
                    self.parameters(parameters);
                }
                for specifier in &mut class.delegation_specifiers {
                    self.delegation_specifier(specifier);
                }
                self.declarations(&mut class.declarations);
            }
            Declaration::ClassObject(object) => {
                object.id = self.fresh("class object".to_string());
                self.declarations(&mut object.declarations);
            }
            Declaration::Typedef(typedef) => {
                typedef.id = self.fresh(format!(
                    "typedef `{}`",
                    typedef.name.as_deref().unwrap_or("<anonymous>")
                ));
            }
            Declaration::Extension(extension) => {
                extension.id = self.fresh(format!(
                    "extension `{}`",
                    extension.name.as_deref().unwrap_or("<anonymous>")
                ));
            }
            Declaration::Function(function) => {
                function.id = self.fresh(format!("function `{}`", function.name));
                self.parameters(&mut function.parameters);
                self.type_ref(function.return_type.as_mut());
                if let Some(body) = &mut function.body {
                    self.expression(body);
                }
            }
            Declaration::Property(property) => {
                property.id = self.fresh(format!("property `{}`", property.name));
                self.type_ref(property.type_ref.as_mut());
                if let Some(initializer) = &mut property.initializer {
                    self.expression(initializer);
                }
                if let Some(getter) = &mut property.getter {
                    self.accessor(getter, format!("getter of `{}`", property.name));
                }
                if let Some(setter) = &mut property.setter {
                    self.accessor(setter, format!("setter of `{}`", property.name));
                }
            }
            Declaration::Constructor(constructor) => {
                constructor.id = self.fresh("constructor".to_string());
                self.parameters(&mut constructor.parameters);
                for specifier in &mut constructor.initializers {
                    self.delegation_specifier(specifier);
                }
                if let Some(body) = &mut constructor.body {
                    self.expression(body);
                }
            }
        }
    }

    fn declarations(&mut self, declarations: &mut [Declaration]) {
        for declaration in declarations {
            self.declaration(declaration);
        }
    }

    fn accessor(&mut self, accessor: &mut Accessor, label: String) {
        accessor.id = self.fresh(label);
        if let Some(parameter) = &mut accessor.parameter {
            self.parameter(parameter);
        }
        self.type_ref(accessor.return_type.as_mut());
        if let Some(body) = &mut accessor.body {
            self.expression(body);
        }
    }

    fn parameters(&mut self, parameters: &mut [Parameter]) {
        for parameter in parameters {
            self.parameter(parameter);
        }
    }

    fn parameter(&mut self, parameter: &mut Parameter) {
        parameter.id = self.fresh(format!("parameter `{}`", parameter.name));
        self.type_ref(parameter.type_ref.as_mut());
    }

    fn type_ref(&mut self, type_ref: Option<&mut TypeRef>) {
        if let Some(type_ref) = type_ref {
            type_ref.id = self.fresh(format!("type reference `{}`", type_ref.name));
        }
    }

    fn delegation_specifier(&mut self, specifier: &mut DelegationSpecifier) {
        match specifier {
            DelegationSpecifier::ByExpression {
                id,
                type_ref,
                delegate,
            } => {
                *id = self.fresh(format!("delegation to `{}`", type_ref.name));
                self.type_ref(Some(type_ref));
                if let Some(delegate) = delegate {
                    self.expression(delegate);
                }
            }
            DelegationSpecifier::SuperCall {
                id,
                type_ref,
                arguments,
            } => {
                *id = self.fresh("supertype constructor call".to_string());
                self.type_ref(type_ref.as_mut());
                for argument in arguments {
                    self.expression(argument);
                }
            }
            DelegationSpecifier::SuperClass { id, type_ref } => {
                *id = self.fresh(format!("supertype `{}`", type_ref.name));
                self.type_ref(Some(type_ref));
            }
            DelegationSpecifier::ThisCall { id, arguments } => {
                *id = self.fresh("this call".to_string());
                for argument in arguments {
                    self.expression(argument);
                }
            }
        }
    }

    fn expression(&mut self, expression: &mut Expression) {
        expression.id = self.fresh(expression.describe());
        match &mut expression.kind {
            ExpressionKind::Constant { .. }
            | ExpressionKind::Name { .. }
            | ExpressionKind::Break
            | ExpressionKind::Continue => {}
            ExpressionKind::Dot { receiver, .. } => self.expression(receiver),
            ExpressionKind::Block { statements } => {
                for statement in statements {
                    self.expression(statement);
                }
            }
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expression(condition);
                self.expression(then_branch);
                if let Some(else_branch) = else_branch {
                    self.expression(else_branch);
                }
            }
            ExpressionKind::While { condition, body } => {
                self.expression(condition);
                self.expression(body);
            }
            ExpressionKind::DoWhile { body, condition } => {
                self.expression(body);
                self.expression(condition);
            }
            ExpressionKind::Return { value } => {
                if let Some(value) = value {
                    self.expression(value);
                }
            }
            ExpressionKind::Binary { left, right, .. } => {
                self.expression(left);
                self.expression(right);
            }
            ExpressionKind::Assign { target, value } => {
                self.expression(target);
                self.expression(value);
            }
            ExpressionKind::Call { arguments, .. } => {
                for argument in arguments {
                    self.expression(argument);
                }
            }
            ExpressionKind::LocalVariable {
                type_ref,
                initializer,
                ..
            } => {
                self.type_ref(type_ref.as_mut());
                if let Some(initializer) = initializer {
                    self.expression(initializer);
                }
            }
            ExpressionKind::Lambda { parameters, body } => {
                self.parameters(parameters);
                self.expression(body);
            }
        }
    }
}
