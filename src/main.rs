use anyhow::Result;
use clap::Parser;
use farmstead::cli::{BoardCommand, Cli, Commands, MarketCommand};
use farmstead::market::{Decision, Delivery};
use farmstead::session::Action;
use farmstead::store::HistoryStore;
use farmstead::{
    utils, ChatMode, ChatTurnOrchestrator, Directory, Market, MessageBoard, Registration,
    SessionHandler, Settings, SheetStore, TokenCache, UserRecord,
};
use farmstead::{LlmClient, RowStore};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().unwrap_or_else(|e| {
        eprintln!("Could not load settings ({}), using defaults", e);
        Settings::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone())),
        )
        .init();

    let cli = Cli::parse();
    let store: Arc<dyn RowStore> = Arc::new(SheetStore::new(&settings));

    match cli.command {
        Commands::Assistant { user, password } => {
            handle_assistant(settings, store, user, password).await
        }
        Commands::Board { command } => handle_board(settings, store, command).await,
        Commands::Market {
            user,
            password,
            command,
        } => handle_market(store, &user, &password, command).await,
        Commands::Register => handle_register(store).await,
        Commands::Profile {
            user,
            password,
            name,
            email,
            phone,
            address,
            dob,
        } => handle_profile(store, &user, &password, [name, email, phone, address, dob]).await,
        Commands::ForgotPassword => handle_forgot_password(store).await,
    }
}

fn session_handler(settings: &Settings, store: Arc<dyn RowStore>) -> SessionHandler {
    // A missing API key degrades every completion to the inline failure
    // answer instead of aborting the session.
    let api_key = Settings::api_key().unwrap_or_else(|e| {
        utils::print_error(&format!("{} - assistant answers will be unavailable", e));
        String::new()
    });

    let responder = Arc::new(LlmClient::new(api_key, settings));
    let orchestrator = ChatTurnOrchestrator::new(
        responder,
        HistoryStore::new(store.clone()),
        settings.session.system_prompt.clone(),
    );
    SessionHandler::new(
        orchestrator,
        Directory::new(store),
        TokenCache::new(settings.session.token_path.clone()),
    )
}

async fn handle_assistant(
    settings: Settings,
    store: Arc<dyn RowStore>,
    user: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let handler = session_handler(&settings, store);

    let mut state = handler.resume().await;
    if let (Some(identifier), Some(secret)) = (user, password) {
        let payload = handler
            .handle(&mut state, Action::Login { identifier, secret })
            .await;
        if let Some(notice) = payload.notice {
            utils::print_notice(&notice);
        }
    }

    utils::print_header("AI Assistant for Farmers");
    utils::print_info(&format!("Logged in as: {}", state.username()));
    utils::print_info("Type your question, or /help for commands (Ctrl+C to exit)\n");

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        utils::print_prompt("You: ");
        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/help" => {
                println!("Commands:");
                println!("  /new           - start a new chat");
                println!("  /topics        - list saved chats");
                println!("  /open <name>   - reopen a saved chat");
                println!("  /logout        - log out and forget the session");
                println!("  /help          - show this help\n");
                continue;
            }
            "/new" => {
                let payload = handler.handle(&mut state, Action::NewChat).await;
                if let Some(notice) = payload.notice {
                    utils::print_notice(&notice);
                }
                continue;
            }
            "/topics" => {
                let topics = handler.saved_topics(&mut state).await;
                if topics.is_empty() {
                    utils::print_info("No saved chats yet.");
                } else {
                    for name in topics.iter().rev() {
                        println!("  {}", name);
                    }
                }
                println!();
                continue;
            }
            "/logout" => {
                let payload = handler.handle(&mut state, Action::Logout).await;
                if let Some(notice) = payload.notice {
                    utils::print_notice(&notice);
                }
                continue;
            }
            _ => {}
        }

        let action = match input.strip_prefix("/open ") {
            Some(name) => Action::SelectTopic(name.trim().to_string()),
            None => Action::Submit(input.to_string()),
        };
        let is_submit = matches!(action, Action::Submit(_));

        let payload = handler.handle(&mut state, action).await;
        if let Some(notice) = &payload.notice {
            utils::print_notice(notice);
        }
        if is_submit {
            if let Some(turn) = payload.turns.last() {
                utils::print_turn(turn);
            }
        } else {
            if let Some(topic) = &payload.topic {
                utils::print_header(&format!("Topic: {}", topic));
            }
            for turn in &payload.turns {
                utils::print_turn(turn);
            }
        }
        println!();
    }

    Ok(())
}

async fn handle_board(
    settings: Settings,
    store: Arc<dyn RowStore>,
    command: BoardCommand,
) -> Result<()> {
    let board = MessageBoard::new(store);

    match command {
        BoardCommand::Feed { private, watch } => {
            let mode = if private {
                ChatMode::Private
            } else {
                ChatMode::Public
            };

            match watch {
                Some(secs) => {
                    let secs = if secs == 0 {
                        settings.board.refresh_secs
                    } else {
                        secs
                    };
                    // Timer-driven re-fetch; input handling never blocks on
                    // the refresh.
                    let mut interval =
                        tokio::time::interval(tokio::time::Duration::from_secs(secs));
                    loop {
                        interval.tick().await;
                        print!("\x1B[2J\x1B[1;1H");
                        render_feed(&board, mode).await;
                    }
                }
                None => {
                    render_feed(&board, mode).await;
                }
            }
        }
        BoardCommand::Post {
            name,
            message,
            private,
            to,
        } => {
            let mode = if private {
                ChatMode::Private
            } else {
                ChatMode::Public
            };
            match board.post(&name, &message, mode, to.as_deref()).await {
                Ok(()) => utils::print_success("Message sent!"),
                Err(e) => utils::print_error(&format!("Could not post: {}", e)),
            }
        }
        BoardCommand::Inbox { name } => match board.inbox(&name).await {
            Ok(posts) if posts.is_empty() => utils::print_info("Nothing addressed to you."),
            Ok(posts) => {
                for post in posts {
                    println!(
                        "#{} {}: {}  [{}]",
                        post.id, post.sender, post.message, post.time
                    );
                }
            }
            Err(e) => utils::print_error(&format!("Could not load the inbox: {}", e)),
        },
        BoardCommand::Like { id } => match board.like(id).await {
            Ok(true) => utils::print_success("Liked."),
            Ok(false) => utils::print_info("That message is gone."),
            Err(e) => utils::print_error(&format!("Could not like: {}", e)),
        },
        BoardCommand::Comment { id, name, comment } => {
            match board.add_comment(id, &name, &comment).await {
                Ok(()) => utils::print_success("Comment added."),
                Err(e) => utils::print_error(&format!("Could not comment: {}", e)),
            }
        }
    }

    Ok(())
}

async fn render_feed(board: &MessageBoard, mode: ChatMode) {
    utils::print_header(&format!("{} feed", mode));
    match board.feed_with_comments(mode).await {
        Ok(feed) if feed.is_empty() => {
            utils::print_info("No messages yet. Start the conversation!");
        }
        Ok(feed) => {
            for (post, comments) in feed {
                let addressed = if post.receiver.is_empty() {
                    String::new()
                } else {
                    format!(" (to {})", post.receiver)
                };
                println!(
                    "#{} {}{} says: {}  [{} likes, {}]",
                    post.id, post.sender, addressed, post.message, post.likes, post.time
                );
                for comment in comments {
                    println!("    {} commented: {}", comment.commenter, comment.comment);
                }
            }
        }
        Err(e) => utils::print_error(&format!("Could not load the feed: {}", e)),
    }
}

async fn login_gate(store: &Arc<dyn RowStore>, user: &str, password: &str) -> Option<UserRecord> {
    let directory = Directory::new(store.clone());
    let record = directory.verify(user, password).await;
    if record.is_none() {
        utils::print_error("Please log in first.");
    }
    record
}

async fn handle_market(
    store: Arc<dyn RowStore>,
    user: &str,
    password: &str,
    command: MarketCommand,
) -> Result<()> {
    let record = match login_gate(&store, user, password).await {
        Some(record) => record,
        None => return Ok(()),
    };
    let market = Market::new(store);

    match command {
        MarketCommand::List => match market.listings().await {
            Ok(listings) if listings.is_empty() => utils::print_info("No crops listed yet."),
            Ok(listings) => {
                for (index, listing) in listings.iter().enumerate() {
                    println!(
                        "{}. {} - {} kg of {} at {}/kg ({}, {})",
                        index + 1,
                        listing.farmer,
                        listing.quantity,
                        listing.crop,
                        listing.price,
                        listing.location,
                        listing.phone
                    );
                }
            }
            Err(e) => utils::print_error(&format!("Could not load the market: {}", e)),
        },
        MarketCommand::Sell {
            crop,
            quantity,
            price,
        } => match market.post_listing(&record, &crop, quantity, price).await {
            Ok(()) => utils::print_success("Crop posted to the market!"),
            Err(e) => utils::print_error(&format!("Could not post the crop: {}", e)),
        },
        MarketCommand::Buy {
            listing,
            home_delivery,
        } => {
            let listings = match market.listings().await {
                Ok(listings) => listings,
                Err(e) => {
                    utils::print_error(&format!("Could not load the market: {}", e));
                    return Ok(());
                }
            };
            match listing.checked_sub(1).and_then(|i| listings.get(i)) {
                Some(chosen) => {
                    let delivery = if home_delivery {
                        Delivery::HomeDelivery
                    } else {
                        Delivery::Pickup
                    };
                    match market.place_order(chosen, &record, delivery).await {
                        Ok(order_id) => utils::print_success(&format!(
                            "Order {} placed! The seller will confirm soon.",
                            order_id
                        )),
                        Err(e) => utils::print_error(&format!("Could not place the order: {}", e)),
                    }
                }
                None => utils::print_error("No such listing. Run `market list` first."),
            }
        }
        MarketCommand::Orders => match market.orders_for_buyer(&record.username).await {
            Ok(orders) if orders.is_empty() => utils::print_info("No orders placed yet."),
            Ok(orders) => {
                for order in orders {
                    println!(
                        "{}: {} kg of {} from {} - {} ({})",
                        order.order_id,
                        order.quantity,
                        order.crop,
                        order.farmer,
                        order.status,
                        order.delivery
                    );
                    if !order.tracking.is_empty() {
                        println!(
                            "    courier {} / tracking {} / expected {}",
                            order.courier, order.tracking, order.expected
                        );
                    }
                }
            }
            Err(e) => utils::print_error(&format!("Could not load your orders: {}", e)),
        },
        MarketCommand::Sales => match market.sales_for_farmer(&record.username).await {
            Ok(sales) if sales.is_empty() => utils::print_info("No orders yet."),
            Ok(sales) => {
                for order in sales {
                    println!(
                        "{}: {} wants {} kg of {} for {} - {} ({})",
                        order.order_id,
                        order.buyer,
                        order.quantity,
                        order.crop,
                        order.price,
                        order.status,
                        order.delivery
                    );
                }
            }
            Err(e) => utils::print_error(&format!("Could not load your sales: {}", e)),
        },
        MarketCommand::Decide {
            order_id,
            action,
            courier,
            tracking,
            expected,
        } => {
            let decision = match action.as_str() {
                "accept-pickup" => Decision::AcceptPickup,
                "accept-direct" => Decision::AcceptDirect,
                "accept-courier" => Decision::AcceptCourier {
                    company: courier.unwrap_or_default(),
                    tracking: tracking.unwrap_or_default(),
                    expected: expected.unwrap_or_default(),
                },
                "reject" => Decision::Reject,
                other => {
                    utils::print_error(&format!("Unknown action '{}'.", other));
                    return Ok(());
                }
            };
            match market.decide(&order_id, decision).await {
                Ok(true) => utils::print_success("Order updated."),
                Ok(false) => utils::print_info("Order not found or already decided."),
                Err(e) => utils::print_error(&format!("Could not update the order: {}", e)),
            }
        }
    }

    Ok(())
}

async fn handle_profile(
    store: Arc<dyn RowStore>,
    user: &str,
    password: &str,
    updates: [Option<String>; 5],
) -> Result<()> {
    let mut record = match login_gate(&store, user, password).await {
        Some(record) => record,
        None => return Ok(()),
    };
    let [name, email, phone, address, dob] = updates;

    let changed = [&name, &email, &phone, &address, &dob]
        .iter()
        .any(|u| u.is_some());
    if !changed {
        utils::print_header(&format!("Profile: {}", record.username));
        println!("Name:    {}", record.name);
        println!("Email:   {}", record.email);
        println!("Phone:   {}", record.phone);
        println!("Address: {}", record.address);
        println!("DOB:     {}", record.dob);
        return Ok(());
    }

    if let Some(email) = &email {
        if !farmstead::auth::validate_email(email.trim()) {
            utils::print_error("Please enter a valid email address.");
            return Ok(());
        }
    }
    if let Some(phone) = &phone {
        if !farmstead::auth::validate_phone(phone) {
            utils::print_error("Invalid phone number.");
            return Ok(());
        }
    }

    if let Some(name) = name {
        record.name = name;
    }
    if let Some(email) = email {
        record.email = email.trim().to_string();
    }
    if let Some(phone) = phone {
        record.phone = phone.trim().to_string();
    }
    if let Some(address) = address {
        record.address = address;
    }
    if let Some(dob) = dob {
        record.dob = dob;
    }

    let directory = Directory::new(store);
    match directory.upsert(&record).await {
        Ok(()) => utils::print_success("Profile updated successfully!"),
        Err(e) => utils::print_error(&format!("Could not save the profile: {}", e)),
    }
    Ok(())
}

async fn handle_forgot_password(store: Arc<dyn RowStore>) -> Result<()> {
    use farmstead::auth::{LogMailer, PasswordReset};

    let directory = Directory::new(store);
    let mailer = LogMailer;
    let mut reset = PasswordReset::new(&directory, &mailer);

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    utils::print_header("Forgot Password");
    let email = ask(&mut reader, "Registered email: ").await?;
    if let Err(e) = reset.request_code(&email).await {
        utils::print_error(&format!("{}", e));
        return Ok(());
    }
    utils::print_success("Verification code sent! Check your mail.");

    let code = ask(&mut reader, "Verification code: ").await?;
    if let Err(e) = reset.verify_code(&code) {
        utils::print_error(&format!("{}", e));
        return Ok(());
    }

    let password = ask(&mut reader, "New password: ").await?;
    let confirm = ask(&mut reader, "Confirm new password: ").await?;
    match reset.update_password(&password, &confirm).await {
        Ok(()) => utils::print_success("Password updated! Please log in again."),
        Err(e) => utils::print_error(&format!("{}", e)),
    }
    Ok(())
}

async fn ask(reader: &mut BufReader<io::Stdin>, prompt: &str) -> Result<String> {
    utils::print_prompt(prompt);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

async fn handle_register(store: Arc<dyn RowStore>) -> Result<()> {
    let directory = Directory::new(store);
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    utils::print_header("Create an account");
    let username = ask(&mut reader, "Username: ").await?;
    let password = ask(&mut reader, "Password: ").await?;
    let confirm_password = ask(&mut reader, "Confirm password: ").await?;
    let email = ask(&mut reader, "Email: ").await?;
    let phone = ask(&mut reader, "Phone (+919876543210): ").await?;
    let address = ask(&mut reader, "Address: ").await?;
    let dob = ask(&mut reader, "Date of birth (YYYY-MM-DD): ").await?;

    match directory
        .register(Registration {
            username,
            password,
            confirm_password,
            email,
            phone,
            address,
            dob,
        })
        .await
    {
        Ok(record) => utils::print_success(&format!(
            "Registration successful! You can now log in as '{}'.",
            record.username
        )),
        Err(e) => utils::print_error(&format!("Registration failed: {}", e)),
    }

    Ok(())
}
