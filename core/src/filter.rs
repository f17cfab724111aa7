//! Read-only projections over a todo list.

use crate::types::Todo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn matches(self, todo: &Todo) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.completed,
            Filter::Completed => todo.completed,
        }
    }
}

/// Todos matching `filter`, in their original relative order.
pub fn filter_todos(todos: &[Todo], filter: Filter) -> Vec<Todo> {
    todos.iter().filter(|t| filter.matches(t)).cloned().collect()
}

/// Number of todos not yet completed.
pub fn remaining_count(todos: &[Todo]) -> usize {
    todos.iter().filter(|t| !t.completed).count()
}
