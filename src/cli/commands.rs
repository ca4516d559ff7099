use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "farmstead")]
#[command(author, version, about = "Farmers' assistant: AI chat, message board and crop market", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive AI assistant (guest unless credentials are given)
    Assistant {
        /// Log in as this username or email
        #[arg(short = 'u', long)]
        user: Option<String>,

        /// Password for --user
        #[arg(short = 'p', long)]
        password: Option<String>,
    },

    /// Peer message board
    Board {
        #[command(subcommand)]
        command: BoardCommand,
    },

    /// Crop market (requires login)
    Market {
        #[arg(short = 'u', long)]
        user: String,

        #[arg(short = 'p', long)]
        password: String,

        #[command(subcommand)]
        command: MarketCommand,
    },

    /// Create a new account
    Register,

    /// View or update your profile
    Profile {
        #[arg(short = 'u', long)]
        user: String,

        #[arg(short = 'p', long)]
        password: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        dob: Option<String>,
    },

    /// Reset a forgotten password with a mailed code
    ForgotPassword,
}

#[derive(Subcommand)]
pub enum BoardCommand {
    /// Show the feed, optionally refreshing on a timer
    Feed {
        /// Show the private feed instead of the public one
        #[arg(long)]
        private: bool,

        /// Re-fetch every N seconds until interrupted
        #[arg(short, long)]
        watch: Option<u64>,
    },

    /// Post a message
    Post {
        name: String,
        message: String,

        #[arg(long)]
        private: bool,

        /// Address a private message to this user
        #[arg(long)]
        to: Option<String>,
    },

    /// Private messages addressed to you
    Inbox { name: String },

    /// Like a message by id
    Like { id: u64 },

    /// Comment on a message
    Comment {
        id: u64,
        name: String,
        comment: String,
    },
}

#[derive(Subcommand)]
pub enum MarketCommand {
    /// Browse available crops
    List,

    /// Post a crop for sale
    Sell {
        crop: String,
        quantity: u32,
        price: u32,
    },

    /// Order a listed crop by its position in `list`
    Buy {
        listing: usize,

        /// Request home delivery instead of pickup
        #[arg(long)]
        home_delivery: bool,
    },

    /// Your orders as a buyer
    Orders,

    /// Orders addressed to you as a seller
    Sales,

    /// Accept or reject a pending order
    Decide {
        order_id: String,

        /// accept-pickup, accept-direct, accept-courier or reject
        #[arg(long, default_value = "accept-pickup")]
        action: String,

        #[arg(long)]
        courier: Option<String>,

        #[arg(long)]
        tracking: Option<String>,

        #[arg(long)]
        expected: Option<String>,
    },
}
