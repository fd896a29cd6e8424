use crate::{
    environment::Environment,
    evaluate::{Evaluate, RuntimeError, Value},
    parse::Stmt,
};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

#[derive(Debug)]
pub struct Function {
    name: String,
    parameters: Vec<String>,
    body: Rc<Vec<Stmt>>,
}

impl Function {
    pub fn new(name: String, parameters: Vec<String>, body: Rc<Vec<Stmt>>) -> Self {
        Function {
            name,
            parameters,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Runs the body in a fresh environment holding only the parameters.
    /// The caller checks the argument count.
    pub fn call<W: Write, R: BufRead>(
        &self,
        interpreter: &mut Evaluate<W, R>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let mut environment = Environment::new();
        for (parameter, argument) in self.parameters.iter().zip(arguments) {
            environment.define(parameter.clone(), argument);
        }
        interpreter.execute_block(&self.body, environment)
    }
}

/// Every function defined so far, by name. Shared by all call frames.
#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: HashMap<String, Rc<Function>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        FunctionTable {
            functions: HashMap::new(),
        }
    }

    /// Registers `function`, returning the definition it replaced, if any.
    pub fn define(&mut self, function: Function) -> Option<Rc<Function>> {
        self.functions
            .insert(function.name.clone(), Rc::new(function))
    }

    pub fn get(&self, name: &str) -> Option<Rc<Function>> {
        self.functions.get(name).map(Rc::clone)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Expr;

    fn body(value: i64) -> Rc<Vec<Stmt>> {
        Rc::new(vec![Stmt::Expression {
            expr: Expr::Literal(value),
            line: 1,
        }])
    }

    #[test]
    fn last_definition_wins() {
        let mut table = FunctionTable::new();
        assert!(table
            .define(Function::new("f".to_string(), vec![], body(1)))
            .is_none());
        let replaced = table.define(Function::new(
            "f".to_string(),
            vec!["a".to_string()],
            body(2),
        ));
        assert_eq!(replaced.map(|f| f.arity()), Some(0));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("f").map(|f| f.arity()), Some(1));
        assert!(table.get("g").is_none());
    }
}
