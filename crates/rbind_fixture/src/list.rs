/// Singly linked list; the bridge marshals it as nested named lists.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub value: i32,
    pub next: Option<Box<Node>>,
}
