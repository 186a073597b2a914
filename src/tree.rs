//! The tree (DOM) parser: materializes a whole message as a graph of typed
//! nodes.
//!
//! Nodes are allocated bump-style into fixed-size pages that are never freed
//! individually; a page is recycled wholesale when the next message is
//! parsed. Children of a container always occupy one contiguous run inside a
//! single page, so navigating to a child is one index computation.
//!
//! The parser is a non-recursive loop over an explicit stack, so input
//! nesting depth cannot overflow the call stack. Its key defence against
//! adversarial input is the *bounded nodes* rule: every value needs at least
//! one input byte for its type, so the bytes of not-yet-parsed input bound
//! how many more nodes a message can possibly contain. A container declaring
//! more children than that is rejected immediately, before anything is
//! allocated for it.
//!
//! Parsing can be blocking ([`Tree::parse`]) or resumable
//! ([`Tree::try_parse`]) when the input arrives through a [`Fill`] callback.
//!
//! [`Tree::parse`]: struct.Tree.html#method.parse
//! [`Tree::try_parse`]: struct.Tree.html#method.try_parse
//! [`Fill`]: ../reader/trait.Fill.html

use codec;
use error::{Error, ErrorKind, Result};
use node::Node;
use reader::Fill;
use tag::{Tag, TagKind};

use std::cell::Cell;
use std::cmp;
use std::fmt;

/// Nodes per standard page; at roughly 24 bytes per node this keeps a page
/// in the ballpark of one small allocation worth of cache lines.
const PAGE_NODES: usize = 256;

/// Initial capacity of the parse stack; deeper nesting grows it by doubling.
const PARSE_STACK_CAPACITY: usize = 8;

/// Initial size of the stream buffer, doubled on demand up to the configured
/// maximum message size.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Reference to one node in the tree's page list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct NodeRef {
    pub page: u32,
    pub index: u32,
}

#[derive(Debug, Copy, Clone)]
pub(crate) enum NodeValue {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f32),
    Double(f64),
    /// str/bin payload at this offset into the tree's data region.
    Bytes { offset: usize },
    /// ext payload plus its application-defined type.
    ExtBytes { offset: usize, exttype: i8 },
    /// First node of the contiguous child run of an array/map.
    Children(NodeRef),
}

/// One parsed value. `len` is the byte length for str/bin/ext and the
/// declared count for arrays/maps.
#[derive(Debug, Copy, Clone)]
pub(crate) struct NodeData {
    pub kind: TagKind,
    pub len: u32,
    pub value: NodeValue,
}

impl NodeData {
    fn nil() -> Self {
        Self {
            kind: TagKind::Nil,
            len: 0,
            value: NodeValue::Nil,
        }
    }
}

struct Page {
    nodes: Vec<NodeData>,
}

impl Page {
    /// A page's node vector never reallocates: child runs inside it must
    /// stay put once handed out.
    fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
        }
    }
}

/// One open container during parsing.
#[derive(Debug, Copy, Clone)]
struct Level {
    /// The next child node to fill in.
    child: NodeRef,
    /// Children left to parse at this level.
    left: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ParseState {
    NotStarted,
    InProgress,
    Parsed,
}

struct Parser {
    stack: Vec<Level>,
    /// Upper bound on the nodes that can still follow: unread input bytes
    /// minus one reserved byte per already-declared, not-yet-parsed child.
    possible_nodes_left: usize,
    /// Bytes reserved for the node currently being parsed; only committed
    /// when the node completes, so a suspended parse re-reserves from
    /// scratch on resume.
    current_node_reserved: usize,
    /// Bump cursor: the page being filled and the nodes left in it.
    cursor_page: usize,
    cursor_left: usize,
}

enum Source<'a> {
    /// A complete message (or sequence of messages) borrowed from the
    /// caller.
    Blob(&'a [u8]),
    /// An owned buffer filled through a callback. `buf.len()` is the
    /// capacity; `len` is how much of it holds data.
    Stream {
        buf: Vec<u8>,
        len: usize,
        fill: Box<dyn Fill + 'a>,
    },
}

/// A parsed MessagePack message, navigated through [`Node`] handles.
///
/// A tree parses one message at a time; parsing again consumes the next
/// message from the same input and recycles the node storage. Errors are
/// sticky, like on the reader and writer.
///
/// [`Node`]: ../node/struct.Node.html
pub struct Tree<'a> {
    source: Source<'a>,
    /// Offset of the current message within a blob source.
    start: usize,
    /// Bytes consumed by the current parse.
    size: usize,
    pages: Vec<Page>,
    root: NodeRef,
    node_count: usize,
    max_size: usize,
    max_nodes: usize,
    state: ParseState,
    parser: Parser,
    /// `Cell` so that node accessors, which share the tree, can flag errors.
    err: Cell<Option<ErrorKind>>,
}

impl<'a> Tree<'a> {
    /// Creates a tree over a complete message held in `data`.
    ///
    /// Nothing is parsed yet; call [`parse`] first. Message size and node
    /// count are bounded by the input itself, so no explicit limits apply.
    ///
    /// [`parse`]: #method.parse
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_source(Source::Blob(data), usize::max_value(), usize::max_value())
    }

    /// Creates a tree that pulls its input through `fill`.
    ///
    /// `max_size` bounds the bytes a single message may occupy and
    /// `max_nodes` bounds its total node count; a message exceeding either
    /// fails with [`ErrorKind::TooBig`]. Both limits should be set as small
    /// as the application allows when the input is untrusted.
    ///
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    pub fn with_fill<F: Fill + 'a>(fill: F, max_size: usize, max_nodes: usize) -> Self {
        Self::with_source(
            Source::Stream {
                buf: Vec::new(),
                len: 0,
                fill: Box::new(fill),
            },
            max_size,
            max_nodes,
        )
    }

    fn with_source(source: Source<'a>, max_size: usize, max_nodes: usize) -> Self {
        Self {
            source,
            start: 0,
            size: 0,
            pages: Vec::new(),
            root: NodeRef { page: 0, index: 0 },
            node_count: 0,
            max_size,
            max_nodes,
            state: ParseState::NotStarted,
            parser: Parser {
                stack: Vec::with_capacity(PARSE_STACK_CAPACITY),
                possible_nodes_left: 0,
                current_node_reserved: 0,
                cursor_page: 0,
                cursor_left: 0,
            },
            err: Cell::new(None),
        }
    }

    /// Parses the next message, blocking on the fill callback as needed.
    ///
    /// A clean end of input before the first byte of a message fails with
    /// [`ErrorKind::Eof`]; input ending in the middle of a message fails
    /// with [`ErrorKind::Io`] (stream) or [`ErrorKind::Invalid`] (blob).
    ///
    /// [`ErrorKind::Eof`]: ../error/enum.ErrorKind.html
    /// [`ErrorKind::Io`]: ../error/enum.ErrorKind.html
    /// [`ErrorKind::Invalid`]: ../error/enum.ErrorKind.html
    pub fn parse(&mut self) -> Result<()> {
        self.check()?;
        if self.state != ParseState::InProgress {
            if !self.parse_start()? {
                return Err(self.fail(ErrorKind::Eof, "end of stream before a new message"));
            }
        }
        if !self.continue_parsing()? {
            return Err(self.fail(
                ErrorKind::Io,
                "stream ended in the middle of a message",
            ));
        }
        self.state = ParseState::Parsed;
        debug!("parsed a tree of {} bytes, {} nodes", self.size, self.node_count);
        Ok(())
    }

    /// Parses as much of the next message as the input allows, without
    /// blocking.
    ///
    /// Returns `Ok(true)` when a complete message has been parsed and the
    /// root is available. Returns `Ok(false)` when the fill callback
    /// reported no data: no error is flagged, the state is kept, and the
    /// call can be repeated once more input is available.
    pub fn try_parse(&mut self) -> Result<bool> {
        self.check()?;
        if self.state != ParseState::InProgress {
            if !self.parse_start()? {
                return Ok(false);
            }
        }
        if !self.continue_parsing()? {
            return Ok(false);
        }
        self.state = ParseState::Parsed;
        Ok(true)
    }

    /// Returns the root node of the parsed message.
    ///
    /// Fails with [`ErrorKind::Bug`] if no message has been parsed.
    ///
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    pub fn root<'t>(&'t self) -> Result<Node<'t, 'a>> {
        self.check()?;
        if self.state != ParseState::Parsed {
            return Err(self.fail(ErrorKind::Bug, "the tree has not been parsed"));
        }
        Ok(Node::new(self, self.root))
    }

    /// The number of nodes in the parsed message (map children count as two
    /// nodes per pair).
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// The byte size of the parsed message.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Adjusts the message size and node count limits.
    ///
    /// Applies to the next [`parse`] or [`try_parse`]; fails with
    /// [`ErrorKind::Bug`] while a parse is in progress.
    ///
    /// [`parse`]: #method.parse
    /// [`try_parse`]: #method.try_parse
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    pub fn set_limits(&mut self, max_size: usize, max_nodes: usize) -> Result<()> {
        self.check()?;
        if self.state == ParseState::InProgress {
            return Err(self.fail(
                ErrorKind::Bug,
                "limits cannot change during an in-progress parse",
            ));
        }
        self.max_size = max_size;
        self.max_nodes = max_nodes;
        Ok(())
    }

    /// Returns the error state of this tree, if any.
    pub fn error(&self) -> Option<ErrorKind> {
        self.err.get()
    }

    /// Puts the tree into an error state; all further operations become
    /// no-ops.
    pub fn flag_error(&self, kind: ErrorKind) {
        if self.err.get().is_none() {
            debug!("tree error flagged by caller: {:?}", kind);
            self.err.set(Some(kind));
        }
    }

    /// Finishes with this tree, returning the final error state.
    pub fn finish(self) -> Result<()> {
        match self.err.get() {
            Some(kind) => Err(Error::new(kind, "tree is in an error state")),
            None => Ok(()),
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self.err.get() {
            Some(kind) => Err(Error::new(kind, "tree is in an error state")),
            None => Ok(()),
        }
    }

    /// Flags `kind` (first error wins) and returns an error to propagate.
    /// Takes `&self`: node accessors flag errors through the shared tree.
    pub(crate) fn fail<S: Into<String>>(&self, kind: ErrorKind, msg: S) -> Error {
        self.absorb(Error::new(kind, msg))
    }

    pub(crate) fn absorb(&self, e: Error) -> Error {
        if self.err.get().is_none() {
            debug!("tree error: {:?}: {}", e.kind(), e);
            self.err.set(Some(e.kind()));
        }
        e
    }

    /// The data region of the current message. Node byte offsets index into
    /// this slice.
    pub(crate) fn data(&self) -> &[u8] {
        match self.source {
            Source::Blob(blob) => &blob[self.start..],
            Source::Stream { ref buf, len, .. } => &buf[..len],
        }
    }

    pub(crate) fn node_data(&self, node: NodeRef) -> &NodeData {
        &self.pages[node.page as usize].nodes[node.index as usize]
    }

    fn node_data_mut(&mut self, node: NodeRef) -> &mut NodeData {
        &mut self.pages[node.page as usize].nodes[node.index as usize]
    }

    fn data_length(&self) -> usize {
        self.data().len()
    }

    /// Sets up a fresh parse: recycles node storage, drops the bytes of the
    /// previous message and allocates the root. Returns `Ok(false)` if no
    /// input is available yet.
    fn parse_start(&mut self) -> Result<bool> {
        debug_assert!(self.state != ParseState::InProgress);

        self.state = ParseState::InProgress;
        self.parser.current_node_reserved = 0;

        if self.size > 0 {
            let size = self.size;
            match self.source {
                Source::Blob(_) => self.start += size,
                Source::Stream {
                    ref mut buf,
                    ref mut len,
                    ..
                } => {
                    // Move the unread trailing bytes to the buffer start.
                    // TODO: defer this until the fill path actually needs
                    // the room
                    for i in 0..*len - size {
                        buf[i] = buf[size + i];
                    }
                    *len -= size;
                }
            }
            self.size = 0;
            self.node_count = 0;
        }

        // make sure at least one byte is available before allocating anything
        self.parser.possible_nodes_left = self.data_length();
        if !self.reserve_bytes(1)? {
            self.state = ParseState::NotStarted;
            return Ok(false);
        }
        self.parser.possible_nodes_left -= 1;
        self.node_count = 1;

        self.pages.clear();
        self.pages.push(Page::with_capacity(PAGE_NODES));
        self.pages[0].nodes.push(NodeData::nil());
        self.parser.cursor_page = 0;
        self.parser.cursor_left = PAGE_NODES - 1;

        self.root = NodeRef { page: 0, index: 0 };
        self.parser.stack.clear();
        self.parser.stack.push(Level {
            child: self.root,
            left: 1,
        });
        Ok(true)
    }

    /// Drives the parse loop until the message is complete or input runs
    /// out. Returns `Ok(false)` on suspension.
    fn continue_parsing(&mut self) -> Result<bool> {
        while !self.parser.stack.is_empty() {
            let level = self.parser.stack.len() - 1;
            let node_ref = self.parser.stack[level].child;
            if !self.parse_node(node_ref)? {
                return Ok(false);
            }
            {
                let top = &mut self.parser.stack[level];
                top.left -= 1;
                top.child.index += 1;
            }
            // pop completed levels (this also finishes the root)
            while let Some(&Level { left: 0, .. }) = self.parser.stack.last() {
                self.parser.stack.pop();
            }
        }
        Ok(true)
    }

    fn parse_node(&mut self, node_ref: NodeRef) -> Result<bool> {
        if !self.parse_node_contents(node_ref)? {
            return Ok(false);
        }

        // Commit: the reservation becomes consumed input. For containers the
        // reservation includes one byte per child; those bytes are not part
        // of this node's own size.
        self.parser.possible_nodes_left -= self.parser.current_node_reserved;
        let node = *self.node_data(node_ref);
        let mut node_size = self.parser.current_node_reserved + 1;
        match node.kind {
            TagKind::Array => node_size -= node.len as usize,
            TagKind::Map => node_size -= node.len as usize * 2,
            _ => {}
        }
        self.size += node_size;
        Ok(true)
    }

    fn parse_node_contents(&mut self, node_ref: NodeRef) -> Result<bool> {
        self.parser.current_node_reserved = 0;

        // The type byte was pre-reserved by the parent, so it is in bounds.
        let first = self.data()[self.size];
        let header = codec::header_size(first);
        if header > 1 && !self.reserve_bytes(header - 1)? {
            return Ok(false);
        }

        let decoded = codec::decode_tag(&self.data()[self.size..]);
        let (tag, header) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => return Err(self.absorb(e)),
        };

        let node = match tag {
            Tag::Nil => NodeData::nil(),
            Tag::Bool(v) => NodeData {
                kind: TagKind::Bool,
                len: 0,
                value: NodeValue::Bool(v),
            },
            Tag::Int(v) => NodeData {
                kind: TagKind::Int,
                len: 0,
                value: NodeValue::Int(v),
            },
            Tag::Uint(v) => NodeData {
                kind: TagKind::Uint,
                len: 0,
                value: NodeValue::Uint(v),
            },
            Tag::Float(v) => NodeData {
                kind: TagKind::Float,
                len: 0,
                value: NodeValue::Float(v),
            },
            Tag::Double(v) => NodeData {
                kind: TagKind::Double,
                len: 0,
                value: NodeValue::Double(v),
            },
            Tag::Str(len) | Tag::Bin(len) => {
                let offset = self.size + header;
                if !self.reserve_bytes(len as usize)? {
                    return Ok(false);
                }
                NodeData {
                    kind: tag.kind(),
                    len,
                    value: NodeValue::Bytes { offset },
                }
            }
            Tag::Ext(exttype, len) => {
                let offset = self.size + header;
                if !self.reserve_bytes(len as usize)? {
                    return Ok(false);
                }
                NodeData {
                    kind: TagKind::Ext,
                    len,
                    value: NodeValue::ExtBytes { offset, exttype },
                }
            }
            Tag::Array(count) => return self.parse_children(node_ref, TagKind::Array, count),
            Tag::Map(count) => return self.parse_children(node_ref, TagKind::Map, count),
            Tag::Missing => unreachable!("the decoder never produces a missing tag"),
        };
        *self.node_data_mut(node_ref) = node;
        Ok(true)
    }

    fn parse_children(&mut self, node_ref: NodeRef, kind: TagKind, count: u32) -> Result<bool> {
        let total = if kind == TagKind::Map {
            match (count as usize).checked_mul(2) {
                Some(total) => total,
                None => {
                    return Err(self.fail(
                        ErrorKind::TooBig,
                        "map slot count does not fit this platform",
                    ));
                }
            }
        } else {
            count as usize
        };

        // The bounded-nodes rule: every child needs at least one input byte
        // for its type, so reserve one byte per child up front. A maliciously
        // declared count is rejected here in constant time, before any node
        // is allocated.
        if !self.reserve_bytes(total)? {
            return Ok(false);
        }

        let node_count = match self.node_count.checked_add(total) {
            Some(node_count) => node_count,
            None => {
                return Err(self.fail(ErrorKind::TooBig, "node count overflow"));
            }
        };
        self.node_count = node_count;
        if self.node_count > self.max_nodes {
            return Err(self.fail(
                ErrorKind::TooBig,
                "message exceeds the configured maximum node count",
            ));
        }

        let children = self.alloc_children(total);
        *self.node_data_mut(node_ref) = NodeData {
            kind,
            len: count,
            value: NodeValue::Children(children),
        };
        self.parser.stack.push(Level {
            child: children,
            left: total,
        });
        Ok(true)
    }

    /// Allocates a contiguous run of `total` nodes and returns its first
    /// node.
    fn alloc_children(&mut self, total: usize) -> NodeRef {
        if total <= self.parser.cursor_left {
            let page = self.parser.cursor_page;
            let index = self.pages[page].nodes.len();
            let new_len = index + total;
            self.pages[page].nodes.resize(new_len, NodeData::nil());
            self.parser.cursor_left -= total;
            return NodeRef {
                page: page as u32,
                index: index as u32,
            };
        }

        // The run does not fit the current page. Oversized runs, and runs
        // that would waste a page still mostly empty, get a dedicated
        // exactly-sized page while the cursor stays on the current page;
        // otherwise the rest of the current page is wasted (at most 1/8 of
        // it) and a fresh page is started.
        if total > PAGE_NODES || self.parser.cursor_left > PAGE_NODES / 8 {
            debug!(
                "dedicated page for {} children, keeping {} nodes of the current page",
                total, self.parser.cursor_left
            );
            let mut page = Page::with_capacity(total);
            page.nodes.resize(total, NodeData::nil());
            self.pages.push(page);
            NodeRef {
                page: (self.pages.len() - 1) as u32,
                index: 0,
            }
        } else {
            debug!(
                "new page for {} children, wasting {} nodes",
                total, self.parser.cursor_left
            );
            let mut page = Page::with_capacity(PAGE_NODES);
            page.nodes.resize(total, NodeData::nil());
            self.pages.push(page);
            self.parser.cursor_page = self.pages.len() - 1;
            self.parser.cursor_left = PAGE_NODES - total;
            NodeRef {
                page: self.parser.cursor_page as u32,
                index: 0,
            }
        }
    }

    /// Accounts for `extra` more input bytes needed by the current node,
    /// filling from the stream if they are not yet available. Returns
    /// `Ok(false)` if the input is not available right now (non-blocking
    /// suspension).
    fn reserve_bytes(&mut self, extra: usize) -> Result<bool> {
        let reserved = match self.parser.current_node_reserved.checked_add(extra) {
            Some(reserved) => reserved,
            None => {
                // more likely a corrupt declared size than a legitimate
                // message too large for this platform
                return Err(self.fail(
                    ErrorKind::Invalid,
                    "declared sizes overflow this platform",
                ));
            }
        };
        self.parser.current_node_reserved = reserved;

        // possible_nodes_left already excludes the bytes reserved for the
        // children of enclosing containers, so even a well-filled buffer may
        // need more input here.
        if reserved <= self.parser.possible_nodes_left {
            return Ok(true);
        }
        self.reserve_fill()
    }

    fn reserve_fill(&mut self) -> Result<bool> {
        let needed = self.parser.current_node_reserved;

        let projected = match self.data_length().checked_add(needed) {
            Some(projected) => projected,
            None => {
                return Err(self.fail(ErrorKind::TooBig, "message size overflow"));
            }
        };
        if projected > self.max_size {
            return Err(self.fail(
                ErrorKind::TooBig,
                "message exceeds the configured maximum size",
            ));
        }

        match self.source {
            Source::Blob(_) => {
                // A blob is promised to hold whole messages: there is nothing
                // to fill from. At a message boundary this is a clean end of
                // input; mid-message the data is malformed.
                let kind = if self.size == 0 && self.data_length() == 0 {
                    ErrorKind::Eof
                } else {
                    ErrorKind::Invalid
                };
                Err(self.fail(kind, "input ends before the message does"))
            }
            Source::Stream {
                ref mut buf,
                ref mut len,
                ref mut fill,
            } => {
                let want = *len + needed;
                if want > buf.len() {
                    let mut new_capacity = cmp::max(buf.len(), INITIAL_BUFFER_SIZE);
                    while new_capacity < want {
                        new_capacity *= 2;
                    }
                    let new_capacity = cmp::min(new_capacity, self.max_size);
                    buf.resize(new_capacity, 0);
                }

                loop {
                    let result = fill.fill(&mut buf[*len..]);
                    let read = match result {
                        Ok(read) => read,
                        Err(e) => {
                            if self.err.get().is_none() {
                                self.err.set(Some(e.kind()));
                            }
                            return Err(e);
                        }
                    };
                    if read == 0 {
                        // no data available right now; resumable
                        return Ok(false);
                    }
                    *len += read;
                    self.parser.possible_nodes_left += read;
                    if self.parser.possible_nodes_left >= needed {
                        return Ok(true);
                    }
                }
            }
        }
    }
}

impl<'a> fmt::Debug for Tree<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Tree")
            .field("state", &self.state)
            .field("size", &self.size)
            .field("node_count", &self.node_count)
            .field("err", &self.err.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fill source handing out one predefined chunk per call; an empty
    /// chunk models "no data available right now".
    struct StagedStream {
        stages: Vec<Vec<u8>>,
        next: usize,
    }

    impl StagedStream {
        fn new(stages: Vec<Vec<u8>>) -> Self {
            Self { stages, next: 0 }
        }
    }

    impl Fill for StagedStream {
        fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.next >= self.stages.len() {
                return Ok(0);
            }
            let stage = &self.stages[self.next];
            assert!(stage.len() <= buf.len(), "stage larger than the fill window");
            buf[..stage.len()].copy_from_slice(stage);
            self.next += 1;
            Ok(stage.len())
        }
    }

    #[test]
    fn parses_the_homepage_example() {
        let data = [
            0x82, 0xa7, 0x63, 0x6f, 0x6d, 0x70, 0x61, 0x63, 0x74, 0xc3, 0xa6, 0x73, 0x63, 0x68,
            0x65, 0x6d, 0x61, 0x00,
        ];
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        assert_eq!(tree.size(), 18);
        assert_eq!(tree.node_count(), 5);

        let root = tree.root().unwrap();
        assert_eq!(root.kind(), TagKind::Map);
        assert_eq!(root.map_count().unwrap(), 2);
        assert_eq!(root.map_str("compact").unwrap().as_bool().unwrap(), true);
        assert_eq!(root.map_str("schema").unwrap().as_u32().unwrap(), 0);
        tree.finish().unwrap();
    }

    #[test]
    fn malicious_container_count_is_rejected_immediately() {
        // A 3-byte message declaring a map of 65535 pairs. The declared
        // children cannot possibly fit the remaining 0 bytes; this must fail
        // before allocating 131070 nodes.
        let mut tree = Tree::new(&[0xde, 0xff, 0xff]);
        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::Invalid);
        // only the root page was ever allocated
        assert!(tree.pages.len() <= 1);
        assert!(tree.pages.get(0).map(|p| p.nodes.len()).unwrap_or(0) <= 1);
    }

    #[test]
    fn malicious_count_against_stream_limit_is_too_big() {
        let mut tree = Tree::with_fill(
            StagedStream::new(vec![vec![0xde, 0xff, 0xff]]),
            64, // max message size far below the declared content
            1 << 20,
        );
        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::TooBig);
    }

    #[test]
    fn max_nodes_is_enforced() {
        // [0, 0, 0, 0] with a limit of 3 nodes
        let data = [0x94, 0x00, 0x00, 0x00, 0x00];
        let mut tree = Tree::with_fill(StagedStream::new(vec![data.to_vec()]), 4096, 3);
        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::TooBig);
    }

    #[test]
    fn try_parse_suspends_and_resumes() {
        // First call delivers nothing, then the message arrives.
        let mut tree = Tree::with_fill(
            StagedStream::new(vec![vec![], vec![0xa3, b'f', b'o', b'o']]),
            4096,
            1 << 20,
        );
        assert_eq!(tree.try_parse().unwrap(), false);
        assert_eq!(tree.error(), None);

        assert_eq!(tree.try_parse().unwrap(), true);
        let root = tree.root().unwrap();
        assert_eq!(root.kind(), TagKind::Str);
        assert_eq!(root.str_slice().unwrap(), "foo");
    }

    #[test]
    fn try_parse_resumes_in_the_middle_of_a_node() {
        // str(5) split across three deliveries with stalls in between
        let mut tree = Tree::with_fill(
            StagedStream::new(vec![
                vec![0xa5, b'h'],
                vec![],
                vec![b'e', b'l'],
                vec![],
                vec![b'l', b'o'],
            ]),
            4096,
            1 << 20,
        );
        assert_eq!(tree.try_parse().unwrap(), false);
        assert_eq!(tree.try_parse().unwrap(), false);
        assert_eq!(tree.try_parse().unwrap(), true);
        assert_eq!(tree.root().unwrap().str_slice().unwrap(), "hello");
    }

    #[test]
    fn blocking_parse_flags_io_mid_message() {
        let mut tree = Tree::with_fill(
            StagedStream::new(vec![vec![0xa5, b'h', b'i']]),
            4096,
            1 << 20,
        );
        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::Io);
    }

    #[test]
    fn clean_end_of_stream_is_eof() {
        let mut tree = Tree::with_fill(
            StagedStream::new(vec![vec![0x2a]]),
            4096,
            1 << 20,
        );
        tree.parse().unwrap();
        assert_eq!(tree.root().unwrap().as_u8().unwrap(), 42);
        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::Eof);
    }

    #[test]
    fn consumes_a_sequence_of_messages_from_a_blob() {
        let data = [0x2a, 0x92, 0x01, 0x02, 0xa2, b'h', b'i'];
        let mut tree = Tree::new(&data);

        tree.parse().unwrap();
        assert_eq!(tree.root().unwrap().as_u8().unwrap(), 42);

        tree.parse().unwrap();
        {
            let root = tree.root().unwrap();
            assert_eq!(root.array_length().unwrap(), 2);
            assert_eq!(root.array_at(1).unwrap().as_u8().unwrap(), 2);
        }

        tree.parse().unwrap();
        assert_eq!(tree.root().unwrap().str_slice().unwrap(), "hi");

        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::Eof);
    }

    #[test]
    fn consumes_a_sequence_of_messages_from_a_stream() {
        let mut tree = Tree::with_fill(
            StagedStream::new(vec![
                // both messages arrive in one chunk; the second must survive
                // the buffer shuffle of the re-parse
                vec![0x91, 0x07, 0xa3, b'y', b'e', b's'],
            ]),
            4096,
            1 << 20,
        );

        tree.parse().unwrap();
        {
            let root = tree.root().unwrap();
            assert_eq!(root.array_at(0).unwrap().as_u8().unwrap(), 7);
        }

        tree.parse().unwrap();
        assert_eq!(tree.root().unwrap().str_slice().unwrap(), "yes");
    }

    #[test]
    fn deep_nesting_grows_the_parse_stack() {
        // 64 nested arrays around one integer
        let mut data = vec![0x91; 64];
        data.push(0x05);
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();

        let mut node = tree.root().unwrap();
        for _ in 0..64 {
            assert_eq!(node.kind(), TagKind::Array);
            node = node.array_at(0).unwrap();
        }
        assert_eq!(node.as_u8().unwrap(), 5);
    }

    #[test]
    fn large_containers_get_dedicated_pages() {
        // An array of 1000 small values: more children than fit a page.
        let mut data = vec![0xdc, 0x03, 0xe8]; // array16(1000)
        data.extend((0..1000).map(|i| (i % 128) as u8));
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        assert_eq!(tree.node_count(), 1001);

        let root = tree.root().unwrap();
        assert_eq!(root.array_length().unwrap(), 1000);
        for i in 0..1000 {
            assert_eq!(
                root.array_at(i).unwrap().as_u32().unwrap(),
                i % 128,
                "element {}",
                i
            );
        }
    }

    #[test]
    fn empty_containers() {
        let mut tree = Tree::new(&[0x90]);
        tree.parse().unwrap();
        assert_eq!(tree.root().unwrap().array_length().unwrap(), 0);

        let mut tree = Tree::new(&[0x80]);
        tree.parse().unwrap();
        assert_eq!(tree.root().unwrap().map_count().unwrap(), 0);
    }

    #[test]
    fn truncated_blob_is_invalid() {
        let mut tree = Tree::new(&[0x92, 0x01]); // array(2) with one element
        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::Invalid);
    }

    #[test]
    fn root_before_parse_is_a_bug() {
        let tree = Tree::new(&[0x2a]);
        assert_eq!(tree.root().unwrap_err().kind(), ErrorKind::Bug);
    }

    #[test]
    fn errors_are_sticky() {
        let mut tree = Tree::new(&[0xc1]);
        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(tree.parse().unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(tree.root().unwrap_err().kind(), ErrorKind::Invalid);
    }
}
